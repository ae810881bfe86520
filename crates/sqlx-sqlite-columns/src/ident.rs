use crate::error::{Error, Result};

/// Validate that a table or column name is safe for SQL interpolation.
///
/// Accepts names matching `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<()> {
   let mut chars = name.chars();
   let valid = match chars.next() {
      Some(first) => {
         (first.is_ascii_alphabetic() || first == '_')
            && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
      }
      None => false,
   };

   if !valid {
      return Err(Error::InvalidIdentifier {
         name: name.to_string(),
      });
   }
   Ok(())
}

/// Quote an identifier with double quotes.
///
/// Any embedded double quotes are doubled per SQL standard (`"` → `""`).
pub fn quote_identifier(name: &str) -> String {
   format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_validate_identifier() {
      for name in ["users", "_id", "player_uuid", "a1"] {
         assert!(validate_identifier(name).is_ok(), "{name}");
      }
      for name in ["", "1abc", "bad;name", "my table", "t.c", "naïve"] {
         assert!(validate_identifier(name).is_err(), "{name}");
      }
   }

   #[test]
   fn test_quote_identifier() {
      assert_eq!(quote_identifier("users"), "\"users\"");
      assert_eq!(quote_identifier("foo\"bar"), "\"foo\"\"bar\"");
   }
}
