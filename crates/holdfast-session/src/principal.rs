//! Principal-name resolution from session attributes.

use std::collections::HashMap;

use serde_json::Value;

/// Attribute name that carries an explicit principal name for the
/// secondary index.
pub const PRINCIPAL_NAME_INDEX: &str = "holdfast.PRINCIPAL_NAME_INDEX";

/// Attribute name that carries the security context of an authenticated
/// session.
pub const SECURITY_CONTEXT_ATTRIBUTE: &str = "holdfast.SECURITY_CONTEXT";

/// Property path into the security context attribute.
const AUTHENTICATION_NAME_POINTER: &str = "/authentication/name";

/// Derives the principal name of a session from its attribute mapping.
///
/// The resolved name is persisted alongside the session and backs the
/// principal-name index lookup. Returning `None` leaves the session out of
/// the index.
pub trait PrincipalResolver: Send + Sync {
    /// Resolve the principal name, if any, from the current attributes.
    fn resolve(&self, attributes: &HashMap<String, Value>) -> Option<String>;
}

/// Default resolution strategy.
///
/// An explicit [`PRINCIPAL_NAME_INDEX`] attribute wins verbatim. Otherwise
/// the authentication name is read out of the [`SECURITY_CONTEXT_ATTRIBUTE`]
/// value via a JSON pointer walk.
#[derive(Debug, Clone, Default)]
pub struct DefaultPrincipalResolver;

impl PrincipalResolver for DefaultPrincipalResolver {
    fn resolve(&self, attributes: &HashMap<String, Value>) -> Option<String> {
        if let Some(Value::String(name)) = attributes.get(PRINCIPAL_NAME_INDEX) {
            return Some(name.clone());
        }
        attributes
            .get(SECURITY_CONTEXT_ATTRIBUTE)
            .and_then(|context| context.pointer(AUTHENTICATION_NAME_POINTER))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}
