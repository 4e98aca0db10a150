use std::cmp::Ordering;

use serde::Serialize;

use super::domain::{Account, DonationEvent, Profile};
use super::error::ArgumentError;

/// Upper bound on page sizes accepted from callers.
pub const MAX_PAGE_SIZE: usize = 200;

/// Field an entity listing can be ordered by.
pub trait SortKey: Sized + Copy {
    type Item;

    fn parse(raw: &str) -> Option<Self>;
    fn compare(self, left: &Self::Item, right: &Self::Item) -> Ordering;
}

/// Zero-based page selection plus ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<K> {
    pub page: usize,
    pub size: usize,
    pub sort_by: K,
    pub ascending: bool,
}

impl<K: SortKey> PageRequest<K> {
    /// Validate raw query parameters into a typed request.
    pub fn parse(
        page: usize,
        size: usize,
        sort_by: &str,
        ascending: bool,
    ) -> Result<Self, ArgumentError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ArgumentError::PageSize {
                size,
                max: MAX_PAGE_SIZE,
            });
        }
        let sort_by = K::parse(sort_by.trim())
            .ok_or_else(|| ArgumentError::UnknownSortKey(sort_by.to_string()))?;
        Ok(Self {
            page,
            size,
            sort_by,
            ascending,
        })
    }

    /// Sort `items`, then cut out the requested window.
    pub fn apply(&self, mut items: Vec<K::Item>) -> Page<K::Item> {
        let key = self.sort_by;
        items.sort_by(|left, right| {
            let ordering = key.compare(left, right);
            if self.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        let total_items = items.len();
        let total_pages = total_items.div_ceil(self.size);
        let content = items
            .into_iter()
            .skip(self.page.saturating_mul(self.size))
            .take(self.size)
            .collect();

        Page {
            content,
            page: self.page,
            size: self.size,
            total_items,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSortKey {
    Id,
    DonationDate,
    Name,
    Status,
}

impl SortKey for EventSortKey {
    type Item = DonationEvent;

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::Id),
            "donation_date" | "donationDate" => Some(Self::DonationDate),
            "name" => Some(Self::Name),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    fn compare(self, left: &DonationEvent, right: &DonationEvent) -> Ordering {
        match self {
            Self::Id => left.id.cmp(&right.id),
            Self::DonationDate => left
                .donation_date
                .cmp(&right.donation_date)
                .then(left.id.cmp(&right.id)),
            Self::Name => left.name.cmp(&right.name).then(left.id.cmp(&right.id)),
            Self::Status => left.status.cmp(&right.status).then(left.id.cmp(&right.id)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSortKey {
    Id,
    Name,
    PersonalId,
    BloodType,
    LastDonationDate,
}

impl SortKey for ProfileSortKey {
    type Item = Profile;

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "personal_id" | "personalId" => Some(Self::PersonalId),
            "blood_type" | "bloodType" => Some(Self::BloodType),
            "last_donation_date" | "lastDonationDate" => Some(Self::LastDonationDate),
            _ => None,
        }
    }

    fn compare(self, left: &Profile, right: &Profile) -> Ordering {
        let ordering = match self {
            Self::Id => Ordering::Equal,
            Self::Name => left.name.cmp(&right.name),
            Self::PersonalId => left.personal_id.cmp(&right.personal_id),
            Self::BloodType => left.blood_type.cmp(&right.blood_type),
            Self::LastDonationDate => left.last_donation_date.cmp(&right.last_donation_date),
        };
        ordering.then(left.id.cmp(&right.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSortKey {
    Id,
    Email,
}

impl SortKey for AccountSortKey {
    type Item = Account;

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::Id),
            "email" => Some(Self::Email),
            _ => None,
        }
    }

    fn compare(self, left: &Account, right: &Account) -> Ordering {
        match self {
            Self::Id => left.id.cmp(&right.id),
            Self::Email => left.email.cmp(&right.email).then(left.id.cmp(&right.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::donation::domain::{AccountId, AccountRole};

    fn accounts(n: u64) -> Vec<Account> {
        (1..=n)
            .map(|id| Account {
                id: AccountId(id),
                email: format!("donor{id:02}@example.org"),
                role: AccountRole::Member,
            })
            .collect()
    }

    #[test]
    fn rejects_unknown_sort_key_and_empty_pages() {
        assert!(matches!(
            PageRequest::<AccountSortKey>::parse(0, 10, "password", true),
            Err(ArgumentError::UnknownSortKey(key)) if key == "password"
        ));
        assert!(matches!(
            PageRequest::<AccountSortKey>::parse(0, 0, "id", true),
            Err(ArgumentError::PageSize { size: 0, .. })
        ));
    }

    #[test]
    fn descending_pages_walk_from_the_end() {
        let request =
            PageRequest::<AccountSortKey>::parse(1, 2, "email", false).expect("valid request");
        let page = request.apply(accounts(5));

        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 3);
        let ids: Vec<u64> = page.content.iter().map(|account| account.id.0).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let request = PageRequest::<AccountSortKey>::parse(4, 2, "id", true).expect("valid");
        let page = request.apply(accounts(3));
        assert!(page.content.is_empty());
        assert_eq!(page.total_pages, 2);
    }
}
