/// Router Module Index
///
/// Routes are split by who may call them. Authentication is applied as a layer on
/// whole modules, so a protected endpoint can't be exposed by forgetting an extractor.

/// Routes open to anonymous readers.
pub mod public;

/// Routes that require a valid, unrevoked bearer token.
pub mod authenticated;

/// Routes restricted to the `admin` role. The role check lives in each handler.
pub mod admin;
