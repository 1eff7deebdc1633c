use axum::response::Json;

use crate::catalog::{self, Product};

#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Static product catalog", body = [Product])
    ),
    tag = "Catalog"
)]
pub async fn list_products() -> Json<Vec<Product>> {
    Json(catalog::products().to_vec())
}
