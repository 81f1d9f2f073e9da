//! Demo data loader.

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::product::NewProduct;

const CATALOG: &str = include_str!("../fixtures/catalog.yaml");
const SEED_PASSWORD: &str = "password123";

/// Parse the bundled catalog.
pub fn catalog() -> Result<Vec<NewProduct>> {
    serde_yaml::from_str(CATALOG).map_err(|err| ServerError::Internal {
        details: format!("invalid catalog fixture: {err}"),
    })
}

/// Wipe both stores, then insert demo users and the bundled catalog.
///
/// Returns the number of inserted products.
pub async fn run(state: &AppState) -> Result<usize> {
    let products = catalog()?;

    state.products.clear().await?;
    state.users.clear().await?;

    let admin = state.users.register("admin", SEED_PASSWORD, true).await?;
    state.users.register("user1", SEED_PASSWORD, false).await?;

    for product in &products {
        state.products.create(admin.id, product.clone()).await?;
    }

    tracing::info!(products = products.len(), users = 2, "store seeded");
    Ok(products.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Pagination;
    use crate::test_state;

    #[test]
    fn test_catalog_is_valid() {
        use validator::Validate;

        let catalog = catalog().unwrap();
        assert_eq!(catalog.len(), 20);
        assert!(catalog.iter().all(|p| p.validate().is_ok()));
    }

    #[tokio::test]
    async fn test_run_twice() {
        let state = test_state();
        run(&state).await.unwrap();
        let count = run(&state).await.unwrap();

        let page = state
            .products
            .list(None, Pagination::new(None, Some(100), state.products.catalog()))
            .await
            .unwrap();
        assert_eq!(page.count as usize, count);
        assert_eq!(page.products[0].title, "iPhone 15 Pro");

        let admin = state.users.login("admin", SEED_PASSWORD).await.unwrap();
        assert!(admin.is_admin);
        assert!(page.products.iter().all(|p| p.user == admin.id));
        assert!(!state.users.login("user1", SEED_PASSWORD).await.unwrap().is_admin);
    }
}
