//! AWS-backed service implementations
//!
//! One implementation per seam: IAM for the identity provider, DynamoDB for
//! the deletion-record store, SSM Parameter Store for the secret store. All
//! clients are built from a single shared [`aws_config::SdkConfig`] loaded
//! once in the binary.

mod dynamodb;
mod iam;
mod ssm;

pub use dynamodb::DynamoDeletionStore;
pub use iam::IamIdentityProvider;
pub use ssm::SsmSecretStore;
