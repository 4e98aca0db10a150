mod checkin;
mod common;
mod eligibility;
mod registration;
