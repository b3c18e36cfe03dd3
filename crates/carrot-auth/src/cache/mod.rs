mod credential;
mod fingerprint;

pub use credential::CredentialCache;
pub use fingerprint::Fingerprint;
