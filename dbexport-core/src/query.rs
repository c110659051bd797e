//! Effective query resolution for a table export.

/// Picks the query to execute for a table.
///
/// A non-blank table override wins, then a non-blank database default,
/// otherwise `SELECT * FROM {table_name}` is synthesized. The chosen query
/// is returned verbatim; SQL validity is left to the data source.
///
/// # Example
/// ```rust
/// use dbexport_core::query::resolve_query;
///
/// assert_eq!(resolve_query(None, None, "Orders"), "SELECT * FROM Orders");
/// assert_eq!(
///     resolve_query(Some("SELECT id FROM Orders"), Some("  "), "Orders"),
///     "SELECT id FROM Orders"
/// );
/// ```
pub fn resolve_query(
    default_query: Option<&str>,
    override_query: Option<&str>,
    table_name: &str,
) -> String {
    fn non_blank(query: Option<&str>) -> Option<&str> {
        query.filter(|q| !q.trim().is_empty())
    }

    non_blank(override_query)
        .or_else(|| non_blank(default_query))
        .map_or_else(|| format!("SELECT * FROM {}", table_name), str::to_string)
}
