//! Wire types exchanged with the Medool backend

pub mod auth;
pub mod page;
pub mod prescription;
pub mod profile;

pub use auth::{OtpPurpose, OtpRequest, OtpResponse, OtpVerification};
pub use page::Page;
pub use prescription::{Prescription, PrescriptionFile, PrescriptionSource, PrescriptionStatus};
pub use profile::{select_active_profile, Gender, Profile, Relation, UserType};
