//! Read-only lookups the decision engines depend on
//!
//! Credit bureau, offer mart and CRM sit behind these traits so the engines
//! can run against fakes. Implementations must tolerate concurrent reads.

use crate::models::{CreditProfile, CustomerRecord, PreApprovedOffer};

pub mod mock;

pub use mock::{MockCreditBureau, MockCrm, MockOfferMart};

/// Credit bureau. Never fails: unknown phones get a synthesized profile.
pub trait CreditLookup: Send + Sync {
    fn credit_profile(&self, phone: &str) -> CreditProfile;
}

/// Offer mart. May return expired offers; callers treat those as absent.
pub trait OfferLookup: Send + Sync {
    fn pre_approved_offer(&self, phone: &str) -> Option<PreApprovedOffer>;
}

/// Authoritative customer records (CRM).
pub trait IdentityLookup: Send + Sync {
    fn by_phone(&self, phone: &str) -> Option<CustomerRecord>;

    /// First record whose name contains `fragment`, ignoring case.
    fn by_name(&self, fragment: &str) -> Option<CustomerRecord>;

    /// Every record, for administrative listing.
    fn all(&self) -> Vec<CustomerRecord> {
        Vec::new()
    }
}
