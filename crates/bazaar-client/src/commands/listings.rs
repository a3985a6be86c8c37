use tracing::{debug, info};

use bazaar_shared::catalog::{self, SortMode};
use bazaar_shared::constants::RECOMMENDED_COUNT;
use bazaar_shared::query::{Direction, Query};
use bazaar_shared::validation::ListingForm;
use bazaar_shared::{NewProduct, Product, ProductId, Table};

use crate::error::Result;
use crate::remote::tables;
use crate::state::AppState;
use crate::upload::ImageData;

/// Every listing, newest first.
pub async fn fetch_products(state: &AppState) -> Result<Vec<Product>> {
    let query = Query::table(Table::Products).order_by("created_at", Direction::Descending);
    let products: Vec<Product> = tables::select_as(state.backend.as_ref(), &query).await?;
    debug!(count = products.len(), "products fetched");
    Ok(products)
}

pub async fn get_product(state: &AppState, id: &ProductId) -> Result<Option<Product>> {
    let query = Query::table(Table::Products).eq("id", id.as_str()).limit(1);
    let rows: Vec<Product> = tables::select_as(state.backend.as_ref(), &query).await?;
    Ok(rows.into_iter().next())
}

/// Fetch, then filter and sort locally.
pub async fn browse(
    state: &AppState,
    search: &str,
    category: &str,
    mode: SortMode,
) -> Result<Vec<Product>> {
    let products = fetch_products(state).await?;
    Ok(catalog::browse(&products, search, category, mode))
}

/// The newest few listings for the home strip.
pub async fn recommended(state: &AppState) -> Result<Vec<Product>> {
    let products = fetch_products(state).await?;
    Ok(catalog::recommended(&products, RECOMMENDED_COUNT))
}

/// Upload a picked image and return the URL to put in the listing form.
pub async fn upload_image(state: &AppState, image: ImageData) -> Result<String> {
    state.uploader.upload(image).await
}

/// Validate the form and insert the listing, owned by the signed-in user.
pub async fn add_listing(state: &AppState, form: &ListingForm) -> Result<Product> {
    let price = form.validate()?;
    let owner = state.current_user_id().await?;

    let row = NewProduct {
        title: form.title.trim().to_string(),
        category: form.category.trim().to_string(),
        price,
        description: form.description.trim().to_string(),
        image: form.image_url.trim().to_string(),
        owner_id: Some(owner),
    };
    let product: Product = tables::insert_one(state.backend.as_ref(), Table::Products, &row).await?;
    info!(product_id = %product.id, title = %product.title, "listing added");
    Ok(product)
}
