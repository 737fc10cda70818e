//! ACL definition files.
//!
//! ACLs are authored as JSON and installed with a security operation. The
//! loader parses the file into owned wire definitions; the set-acl operation
//! takes ownership and the definitions drop when it resolves. There is no
//! process-wide ACL table.
//!
//! File shape:
//!
//! ```json
//! [
//!   {
//!     "identity": 2,
//!     "key": "second-identity-secret",
//!     "hmac_algorithm": "HmacSHA1",
//!     "scopes": [
//!       { "permissions": ["read", "range"], "value": "prefix-", "tls_required": false }
//!     ]
//!   }
//! ]
//! ```

use std::path::Path;

use kinetic_proto::{Acl, AclScope, Algorithm, Permission};
use serde::Deserialize;
use tracing::debug;

use crate::error::{KineticError, Result};

#[derive(Debug, Deserialize)]
struct AclEntryFile {
    identity: i64,
    key: String,
    #[serde(default)]
    hmac_algorithm: Option<String>,
    scopes: Vec<AclScopeFile>,
}

#[derive(Debug, Deserialize)]
struct AclScopeFile {
    #[serde(default)]
    offset: i64,
    #[serde(default)]
    value: String,
    permissions: Vec<String>,
    #[serde(default)]
    tls_required: bool,
}

fn parse_permission(name: &str) -> Result<Permission> {
    match name {
        "read" => Ok(Permission::Read),
        "write" => Ok(Permission::Write),
        "delete" => Ok(Permission::Delete),
        "range" => Ok(Permission::Range),
        "setup" => Ok(Permission::Setup),
        "p2pop" => Ok(Permission::P2pOp),
        "getlog" => Ok(Permission::GetLog),
        "security" => Ok(Permission::Security),
        _ => Err(KineticError::AclError),
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name {
        "HmacSHA1" => Ok(Algorithm::Sha1),
        "HmacSHA2" => Ok(Algorithm::Sha2),
        _ => Err(KineticError::AclError),
    }
}

/// Load ACL definitions from a JSON file.
///
/// Returns owned definitions; the caller (the set-acl operation) keeps them
/// for exactly as long as the operation lives.
///
/// # Errors
///
/// - [`KineticError::AclError`] if the file cannot be read, is not valid
///   JSON, or names an unknown permission or algorithm
pub fn load_acl_file(path: &Path) -> Result<Vec<Acl>> {
    let data = std::fs::read(path).map_err(|e| {
        debug!(path = %path.display(), error = %e, "acl file unreadable");
        KineticError::AclError
    })?;

    let entries: Vec<AclEntryFile> = serde_json::from_slice(&data).map_err(|e| {
        debug!(path = %path.display(), error = %e, "acl file unparsable");
        KineticError::AclError
    })?;

    entries
        .into_iter()
        .map(|entry| {
            let scopes = entry
                .scopes
                .into_iter()
                .map(|scope| {
                    let permissions = scope
                        .permissions
                        .iter()
                        .map(|p| parse_permission(p))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(AclScope {
                        offset: scope.offset,
                        value: scope.value.into_bytes(),
                        permissions,
                        tls_required: scope.tls_required,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let hmac_algorithm =
                entry.hmac_algorithm.as_deref().map(parse_algorithm).transpose()?;

            Ok(Acl {
                identity: entry.identity,
                key: entry.key.into_bytes(),
                hmac_algorithm,
                scopes,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_two_identity_file() {
        let file = write_file(
            r#"[
                {
                    "identity": 1,
                    "key": "first-secret",
                    "hmac_algorithm": "HmacSHA1",
                    "scopes": [
                        { "permissions": ["read", "write", "delete", "range"] }
                    ]
                },
                {
                    "identity": 2,
                    "key": "second-secret",
                    "scopes": [
                        { "permissions": ["read"], "value": "public-", "tls_required": true }
                    ]
                }
            ]"#,
        );

        let acls = load_acl_file(file.path()).unwrap();
        assert_eq!(acls.len(), 2);

        assert_eq!(acls[0].identity, 1);
        assert_eq!(acls[0].hmac_algorithm, Some(Algorithm::Sha1));
        assert_eq!(acls[0].scopes[0].permissions.len(), 4);

        assert_eq!(acls[1].key, b"second-secret");
        assert_eq!(acls[1].scopes[0].value, b"public-");
        assert!(acls[1].scopes[0].tls_required);
    }

    #[test]
    fn missing_file_is_acl_error() {
        let missing = Path::new("/nonexistent/acl.json");
        assert_eq!(load_acl_file(missing).err(), Some(KineticError::AclError));
    }

    #[test]
    fn malformed_json_is_acl_error() {
        let file = write_file("{ not json ]");
        assert_eq!(load_acl_file(file.path()).err(), Some(KineticError::AclError));
    }

    #[test]
    fn unknown_permission_is_acl_error() {
        let file = write_file(
            r#"[{ "identity": 1, "key": "k", "scopes": [{ "permissions": ["fly"] }] }]"#,
        );
        assert_eq!(load_acl_file(file.path()).err(), Some(KineticError::AclError));
    }

    #[test]
    fn unknown_algorithm_is_acl_error() {
        let file = write_file(
            r#"[{ "identity": 1, "key": "k", "hmac_algorithm": "Md5", "scopes": [] }]"#,
        );
        assert_eq!(load_acl_file(file.path()).err(), Some(KineticError::AclError));
    }
}
