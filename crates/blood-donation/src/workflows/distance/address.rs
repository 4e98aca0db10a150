use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::workflows::donation::Profile;

const COUNTRY: &str = "Vietnam";

fn ward_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)phường\s*").expect("ward prefix pattern compiles"))
}

fn district_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)quận\s*").expect("district prefix pattern compiles"))
}

/// Where donors travel to. Every part is optional; blank parts are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityAddress {
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl FacilityAddress {
    pub fn formatted(&self) -> String {
        join_parts([
            self.street.clone(),
            self.district.clone(),
            self.city.clone(),
            self.state.clone(),
        ])
    }

    pub fn is_blank(&self) -> bool {
        self.formatted().is_empty()
    }
}

/// Home address of `profile` in the form the maps provider resolves best.
///
/// Ward and district lose their first "phường"/"quận" prefix; the country is
/// appended only when something else is present.
pub fn origin_address(profile: &Profile) -> String {
    let ward = profile
        .ward
        .as_deref()
        .map(|ward| ward_prefix().replace(ward, "").into_owned());
    let district = profile
        .district
        .as_deref()
        .map(|district| district_prefix().replace(district, "").into_owned());

    let joined = join_parts([profile.address.clone(), ward, district, profile.city.clone()]);
    if joined.is_empty() {
        joined
    } else {
        format!("{joined}, {COUNTRY}")
    }
}

fn join_parts<const N: usize>(parts: [Option<String>; N]) -> String {
    parts
        .iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
