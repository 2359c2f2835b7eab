pub fn render_local_schema(vector_dim: usize) -> String {
	include_str!("../sql/local.sql").replace("<VECTOR_BYTES>", &(vector_dim * 4).to_string())
}

pub fn render_remote_schema(vector_dim: usize) -> String {
	include_str!("../sql/remote.sql").replace("<VECTOR_DIM>", &vector_dim.to_string())
}

/// Splits a schema script into individual statements. Statements must not contain `;` inside
/// their bodies.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}
