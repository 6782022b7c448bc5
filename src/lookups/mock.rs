//! In-memory bureau, offer mart and CRM seeded with demo customers
//!
//! Read-only after construction, so `&self` lookups are safe to share.

use super::{CreditLookup, IdentityLookup, OfferLookup};
use crate::models::{CreditProfile, CustomerRecord, PreApprovedOffer};
use chrono::{Duration, Utc};
use std::collections::BTreeMap;

/// Score reported for phones the bureau has never seen
pub const DEFAULT_CREDIT_SCORE: u32 = 650;

struct SeedCustomer {
    name: &'static str,
    phone: &'static str,
    email: &'static str,
    address: &'static str,
    city: &'static str,
    age: u32,
    score: u32,
    history: &'static str,
    pre_approved_limit: u64,
    offer_rate_pct: f64,
    offer_valid_days: i64,
}

const SEED: &[SeedCustomer] = &[
    SeedCustomer { name: "Rajesh Kumar", phone: "9876543210", email: "rajesh.kumar@email.com", address: "123 MG Road, Bangalore, Karnataka 560001", city: "Bangalore", age: 35, score: 780, history: "Excellent", pre_approved_limit: 800_000, offer_rate_pct: 11.99, offer_valid_days: 30 },
    SeedCustomer { name: "Priya Sharma", phone: "9876543211", email: "priya.sharma@email.com", address: "456 Park Street, Mumbai, Maharashtra 400001", city: "Mumbai", age: 28, score: 720, history: "Good", pre_approved_limit: 500_000, offer_rate_pct: 12.99, offer_valid_days: 45 },
    SeedCustomer { name: "Amit Patel", phone: "9876543212", email: "amit.patel@email.com", address: "789 Connaught Place, New Delhi, Delhi 110001", city: "New Delhi", age: 42, score: 750, history: "Very Good", pre_approved_limit: 1_200_000, offer_rate_pct: 11.49, offer_valid_days: 60 },
    SeedCustomer { name: "Sunita Reddy", phone: "9876543213", email: "sunita.reddy@email.com", address: "321 Brigade Road, Chennai, Tamil Nadu 600001", city: "Chennai", age: 31, score: 680, history: "Fair", pre_approved_limit: 300_000, offer_rate_pct: 13.99, offer_valid_days: 15 },
    SeedCustomer { name: "Vikram Singh", phone: "9876543214", email: "vikram.singh@email.com", address: "654 Marine Drive, Kochi, Kerala 682001", city: "Kochi", age: 38, score: 710, history: "Good", pre_approved_limit: 600_000, offer_rate_pct: 12.49, offer_valid_days: 20 },
    SeedCustomer { name: "Meera Joshi", phone: "9876543215", email: "meera.joshi@email.com", address: "987 Commercial Street, Pune, Maharashtra 411001", city: "Pune", age: 26, score: 760, history: "Very Good", pre_approved_limit: 700_000, offer_rate_pct: 11.99, offer_valid_days: 40 },
    SeedCustomer { name: "Suresh Kumar", phone: "9876543216", email: "suresh.kumar@email.com", address: "147 Residency Road, Hyderabad, Telangana 500001", city: "Hyderabad", age: 45, score: 790, history: "Excellent", pre_approved_limit: 1_000_000, offer_rate_pct: 10.99, offer_valid_days: 90 },
    SeedCustomer { name: "Anita Gupta", phone: "9876543217", email: "anita.gupta@email.com", address: "258 Mall Road, Chandigarh, Punjab 160001", city: "Chandigarh", age: 33, score: 740, history: "Good", pre_approved_limit: 900_000, offer_rate_pct: 11.49, offer_valid_days: 35 },
    SeedCustomer { name: "Ravi Nair", phone: "9876543218", email: "ravi.nair@email.com", address: "369 MG Road, Trivandrum, Kerala 695001", city: "Trivandrum", age: 29, score: 730, history: "Good", pre_approved_limit: 400_000, offer_rate_pct: 12.99, offer_valid_days: 25 },
    SeedCustomer { name: "Kavita Desai", phone: "9876543219", email: "kavita.desai@email.com", address: "741 Linking Road, Ahmedabad, Gujarat 380001", city: "Ahmedabad", age: 37, score: 770, history: "Very Good", pre_approved_limit: 1_100_000, offer_rate_pct: 11.24, offer_valid_days: 50 },
];

//
// ================= Credit Bureau =================
//

pub struct MockCreditBureau {
    scores: BTreeMap<String, CreditProfile>,
}

impl MockCreditBureau {
    pub fn seeded() -> Self {
        Self::from_profiles(SEED.iter().map(|c| {
            (
                c.phone.to_string(),
                CreditProfile {
                    score: c.score,
                    credit_history: c.history.to_string(),
                },
            )
        }))
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = (String, CreditProfile)>) -> Self {
        Self {
            scores: profiles.into_iter().collect(),
        }
    }
}

impl CreditLookup for MockCreditBureau {
    fn credit_profile(&self, phone: &str) -> CreditProfile {
        self.scores.get(phone).cloned().unwrap_or_else(|| CreditProfile {
            score: DEFAULT_CREDIT_SCORE,
            credit_history: "Limited".to_string(),
        })
    }
}

//
// ================= Offer Mart =================
//

pub struct MockOfferMart {
    offers: BTreeMap<String, PreApprovedOffer>,
}

impl MockOfferMart {
    /// Seed offers with validity counted from now.
    pub fn seeded() -> Self {
        let now = Utc::now();
        Self::from_offers(SEED.iter().map(|c| {
            (
                c.phone.to_string(),
                PreApprovedOffer {
                    limit: c.pre_approved_limit,
                    annual_rate_pct: c.offer_rate_pct,
                    valid_until: now + Duration::days(c.offer_valid_days),
                },
            )
        }))
    }

    pub fn from_offers(offers: impl IntoIterator<Item = (String, PreApprovedOffer)>) -> Self {
        Self {
            offers: offers.into_iter().collect(),
        }
    }
}

impl OfferLookup for MockOfferMart {
    fn pre_approved_offer(&self, phone: &str) -> Option<PreApprovedOffer> {
        self.offers.get(phone).cloned()
    }
}

//
// ================= CRM =================
//

pub struct MockCrm {
    customers: BTreeMap<String, CustomerRecord>,
}

impl MockCrm {
    pub fn seeded() -> Self {
        Self::from_records(SEED.iter().map(|c| CustomerRecord {
            name: c.name.to_string(),
            phone: c.phone.to_string(),
            email: c.email.to_string(),
            address: c.address.to_string(),
            city: c.city.to_string(),
            age: c.age,
            kyc_verified: true,
        }))
    }

    pub fn from_records(records: impl IntoIterator<Item = CustomerRecord>) -> Self {
        Self {
            customers: records
                .into_iter()
                .map(|record| (record.phone.clone(), record))
                .collect(),
        }
    }
}

impl IdentityLookup for MockCrm {
    fn by_phone(&self, phone: &str) -> Option<CustomerRecord> {
        self.customers.get(phone).cloned()
    }

    fn by_name(&self, fragment: &str) -> Option<CustomerRecord> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.customers
            .values()
            .find(|record| record.name.to_lowercase().contains(&needle))
            .cloned()
    }

    fn all(&self) -> Vec<CustomerRecord> {
        self.customers.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bureau_defaults_unknown_phone() {
        let bureau = MockCreditBureau::seeded();
        assert_eq!(bureau.credit_profile("9876543210").score, 780);
        assert_eq!(bureau.credit_profile("1111111111").score, DEFAULT_CREDIT_SCORE);
    }

    #[test]
    fn test_seeded_offers_are_currently_valid() {
        let mart = MockOfferMart::seeded();
        let offer = mart.pre_approved_offer("9876543210").unwrap();
        assert_eq!(offer.limit, 800_000);
        assert!(offer.is_valid_at(Utc::now()));
        assert!(mart.pre_approved_offer("1111111111").is_none());
    }

    #[test]
    fn test_crm_name_search_is_case_insensitive_substring() {
        let crm = MockCrm::seeded();
        let record = crm.by_name("PRIYA").unwrap();
        assert_eq!(record.phone, "9876543211");
        // lowest phone wins among several matches
        assert_eq!(crm.by_name("kumar").unwrap().name, "Rajesh Kumar");
        assert!(crm.by_name("  ").is_none());
        assert_eq!(crm.all().len(), 10);
    }
}
