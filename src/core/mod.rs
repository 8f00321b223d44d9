pub mod claim_token;
pub mod expected;
pub mod jws;
pub mod presentation_submission;
pub mod response;
pub mod trust;
pub mod util;
