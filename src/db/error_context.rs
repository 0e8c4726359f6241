//! Error context extracted from MySQL errors, used whenever a release
//! statement fails so the operator sees the server's own diagnosis.

use sqlx::mysql::MySqlDatabaseError;

/// Longest statement excerpt kept in an error report
const STATEMENT_EXCERPT_LEN: usize = 200;

/// Rich error context extracted from MySQL errors
#[derive(Debug, Clone)]
pub struct SqlErrorContext {
    /// The primary error message
    pub message: String,
    /// Server error number (e.g. 1146 for an unknown table)
    pub number: Option<u16>,
    /// SQLSTATE (e.g. "42S02")
    pub sql_state: Option<String>,
    /// Line reported by the server for syntax errors ("... at line N")
    pub line_number: Option<usize>,
}

impl SqlErrorContext {
    pub fn from_sqlx_error(error: &sqlx::Error) -> Self {
        if let Some(db_error) = error.as_database_error()
            && let Some(my_error) = db_error.try_downcast_ref::<MySqlDatabaseError>()
        {
            let message = my_error.message().to_string();
            return Self {
                line_number: reported_line(&message),
                number: Some(my_error.number()),
                sql_state: my_error.code().map(|s| s.to_string()),
                message,
            };
        }

        Self {
            message: error.to_string(),
            number: None,
            sql_state: None,
            line_number: None,
        }
    }

    /// Format the error together with the offending statement
    pub fn format(&self, statement: &str) -> String {
        let mut msg = String::from("SQL error");
        if let Some(number) = self.number {
            msg.push_str(&format!(" {}", number));
        }
        if let Some(state) = &self.sql_state {
            msg.push_str(&format!(" ({})", state));
        }
        msg.push_str(&format!(": {}\n  Statement: {}", self.message, abbreviate(statement)));

        if let Some(line) = self.line_number
            && statement.lines().count() > 1
        {
            msg.push_str(&format!("\n\n{}", format_line_context(statement, line)));
        }

        msg
    }
}

/// Statement collapsed to one line and cut to a readable length
pub fn abbreviate(statement: &str) -> String {
    let single_line = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= STATEMENT_EXCERPT_LEN {
        return single_line;
    }
    let cut: String = single_line.chars().take(STATEMENT_EXCERPT_LEN).collect();
    format!("{}...", cut)
}

/// Extract N from MySQL's "... near 'x' at line N" syntax error suffix
fn reported_line(message: &str) -> Option<usize> {
    let idx = message.rfind("at line ")?;
    message[idx + "at line ".len()..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse().ok())
}

/// Format SQL content showing context around the error line
pub fn format_line_context(content: &str, error_line: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();
    const CONTEXT_LINES: usize = 2;

    let error_idx = error_line.saturating_sub(1).min(total_lines.saturating_sub(1));
    let start_idx = error_idx.saturating_sub(CONTEXT_LINES);
    let end_idx = (error_idx + CONTEXT_LINES + 1).min(total_lines);

    let mut result = String::new();

    if start_idx > 0 {
        result.push_str(&format!("  ... [{} lines above]\n", start_idx));
    }

    for (idx, line) in lines[start_idx..end_idx].iter().enumerate() {
        let line_num = start_idx + idx + 1;
        let marker = if line_num == error_line { ">" } else { " " };
        result.push_str(&format!("  {} {:4} | {}\n", marker, line_num, line));
    }

    if end_idx < total_lines {
        result.push_str(&format!("  ... [{} lines below]", total_lines - end_idx));
    }

    result
}
