//! Splits a full query into its set-expression and where-clause parts.
//! Grounded verbatim on `original_source/redbiom/search.py::query_plan`: a
//! literal first-occurrence split on the substring `"where"`, not a
//! token-aware partition -- that's what the original does, so that's what
//! this does.

use super::error::QueryError;

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Set(String),
    Where(String),
}

pub fn query_plan(query: &str) -> Result<Vec<Clause>, QueryError> {
    if query.starts_with("where") {
        let part = query.split_once("where").map_or("", |(_, rest)| rest).trim();
        if part.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        return Ok(vec![Clause::Where(part.to_string())]);
    }

    let parts: Vec<&str> = query.splitn(2, "where").collect();
    for part in &parts {
        if part.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
    }

    if parts.len() == 1 {
        Ok(vec![Clause::Set(parts[0].trim().to_string())])
    } else {
        Ok(vec![
            Clause::Set(parts[0].trim().to_string()),
            Clause::Where(parts[1].trim().to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_only() {
        assert_eq!(
            query_plan("A & B").unwrap(),
            vec![Clause::Set("A & B".to_string())]
        );
    }

    #[test]
    fn where_only() {
        assert_eq!(
            query_plan("where age < 10").unwrap(),
            vec![Clause::Where("age < 10".to_string())]
        );
    }

    #[test]
    fn set_and_where() {
        assert_eq!(
            query_plan("A & B where age < 10").unwrap(),
            vec![
                Clause::Set("A & B".to_string()),
                Clause::Where("age < 10".to_string())
            ]
        );
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert!(query_plan("where").is_err());
    }
}
