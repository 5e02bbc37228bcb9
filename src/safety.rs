use crate::error::PipelineError;

/// Authorizes a statement for execution: it must begin with the SELECT
/// keyword. Comparison is done on a trimmed, upper-cased copy; the returned
/// statement keeps its original casing (trimmed). This is a lexical prefix
/// check only: chained statements or mutating functions hidden behind a
/// SELECT prefix are not detected.
///
/// Runs on every synthesized statement before execution and can be applied
/// to externally supplied statements as well.
pub fn authorize(statement: &str) -> Result<String, PipelineError> {
    let trimmed = statement.trim();

    if trimmed.to_uppercase().starts_with("SELECT") {
        Ok(trimmed.to_string())
    } else {
        Err(PipelineError::WriteOperationNotPermitted(leading_keyword(
            trimmed,
        )))
    }
}

/// First whitespace-delimited token, upper-cased, for rejection diagnostics.
fn leading_keyword(statement: &str) -> String {
    statement
        .split_whitespace()
        .next()
        .map(|word| word.to_uppercase())
        .unwrap_or_else(|| "<empty>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_passes_and_keeps_casing() {
        let sql = authorize("  SELECT * FROM Stores WHERE State = 'NY'  ").unwrap();
        assert_eq!(sql, "SELECT * FROM Stores WHERE State = 'NY'");
    }

    #[test]
    fn lowercase_select_passes_identically() {
        let sql = authorize("select * from products").unwrap();
        assert_eq!(sql, "select * from products");
    }

    #[test]
    fn mixed_casing_and_leading_whitespace_pass() {
        for sql in ["SeLeCt 1", "\n\t sElEcT name FROM t", "SELECT\n1"] {
            assert!(authorize(sql).is_ok(), "{:?} should be authorized", sql);
        }
    }

    #[test]
    fn write_statements_are_rejected() {
        for sql in [
            "DELETE FROM Products",
            "insert into t values (1)",
            "UPDATE t SET a = 1",
            "DROP TABLE Stores",
            "alter table t add column b int",
            "CREATE TABLE t (a INT)",
        ] {
            match authorize(sql) {
                Err(PipelineError::WriteOperationNotPermitted(keyword)) => {
                    assert_eq!(keyword, sql.split_whitespace().next().unwrap().to_uppercase());
                }
                other => panic!("{:?} should be rejected, got {:?}", sql, other),
            }
        }
    }

    #[test]
    fn empty_statement_is_rejected() {
        assert!(matches!(
            authorize("   "),
            Err(PipelineError::WriteOperationNotPermitted(_))
        ));
    }
}
