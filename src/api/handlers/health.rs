/// Returns "OK" with 200 status code
pub async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_returns_ok() {
        assert_eq!(tokio_test::block_on(health()), "OK");
    }
}
