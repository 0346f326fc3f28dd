pub const SERVER_PORT: u16 = 5001;

/// Passages requested from the vector search service per turn.
pub const RESULT_COUNT: usize = 5;

pub const REWRITE_WINDOW: usize = 4;

pub fn local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5001".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5001".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}
