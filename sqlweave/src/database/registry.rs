//! Dialect lookup
//!
//! Resolves a [`DialectKind`] to its statically allocated driver. Backends
//! compiled out by cargo features resolve to `UnsupportedDialect`.

use crate::config::DialectKind;
use crate::database::traits::SqlDialect;
use crate::{Error, Result};

/// Driver for `kind`
pub fn dialect_for(kind: DialectKind) -> Result<&'static dyn SqlDialect> {
    match kind {
        #[cfg(feature = "mysql")]
        DialectKind::Mysql => Ok(&crate::database::mysql::MySqlDialect),
        #[cfg(feature = "postgres")]
        DialectKind::Postgres => Ok(&crate::database::postgres::PostgresDialect),
        #[cfg(feature = "sqlite")]
        DialectKind::Sqlite => Ok(&crate::database::sqlite::SqliteDialect),
        #[allow(unreachable_patterns)]
        other => Err(Error::UnsupportedDialect(format!(
            "{other} support is not compiled into this build"
        ))),
    }
}

/// Dialects available in this build
pub fn available() -> Vec<DialectKind> {
    DialectKind::ALL
        .iter()
        .copied()
        .filter(|kind| dialect_for(*kind).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_compiled_dialect_reports_its_kind() {
        for kind in available() {
            assert_eq!(dialect_for(kind).unwrap().kind(), kind);
        }
    }

    #[cfg(all(feature = "mysql", feature = "postgres", feature = "sqlite"))]
    #[test]
    fn test_full_build_offers_every_dialect() {
        assert_eq!(available(), DialectKind::ALL.to_vec());
        assert_eq!(dialect_for(DialectKind::Mysql).unwrap().quote_char(), '`');
    }

    #[cfg(not(feature = "mysql"))]
    #[test]
    fn test_compiled_out_dialect_is_unsupported() {
        assert!(matches!(dialect_for(DialectKind::Mysql), Err(Error::UnsupportedDialect(_))));
    }
}
