//! Product management.
//!
//! Create and update are sent as `multipart/form-data` so an image can ride
//! along. The backend only routes multipart bodies on `POST`, so updates use
//! `POST /products/{id}?_method=PUT`.

use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tracing::{info, instrument};

use shopfront_core::{CategoryId, Price, Product, ProductId};

use crate::AdminClient;
use crate::error::{AdminError, Result};

/// Fields of the create/edit product form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub category_id: CategoryId,
    pub price: Price,
    pub stock: u32,
}

impl ProductInput {
    /// Text fields in form order. A missing description is sent empty.
    fn text_fields(&self) -> [(&'static str, String); 5] {
        [
            ("name", self.name.clone()),
            (
                "description",
                self.description.clone().unwrap_or_default(),
            ),
            ("category_id", self.category_id.to_string()),
            ("price", self.price.amount().to_string()),
            ("stock", self.stock.to_string()),
        ]
    }

    fn to_form(&self, image: Option<ImageUpload>) -> Result<Form> {
        let mut form = self
            .text_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));

        if let Some(image) = image {
            form = form.part("image", image.into_part()?);
        }
        Ok(form)
    }
}

/// An image attached to a product form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file_name: String,
    mime: &'static str,
    bytes: Vec<u8>,
}

impl ImageUpload {
    /// Wrap image bytes. The type is taken from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::UnsupportedImage`] unless the extension is one of
    /// jpg, jpeg, png, gif or webp.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let mime = mime_for(&file_name)
            .ok_or_else(|| AdminError::UnsupportedImage(file_name.clone()))?;
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }

    /// Read an image file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has an unsupported type.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AdminError::ImageRead {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(file_name, bytes)
    }

    /// The MIME type sent with the part.
    #[must_use]
    pub const fn mime(&self) -> &'static str {
        self.mime
    }

    fn into_part(self) -> Result<Part> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(self.mime)
            .map_err(AdminError::Multipart)
    }
}

fn mime_for(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

impl AdminClient {
    /// List all products, bypassing the catalog cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.send_list(self.request(Method::GET, "products")).await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`](shopfront_storefront::ApiError::Validation)
    /// with the backend's field errors if the input is rejected.
    #[instrument(skip(self, input, image), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: &ProductInput,
        image: Option<ImageUpload>,
    ) -> Result<Product> {
        let form = input.to_form(image)?;
        let product: Product = self
            .send_data(
                self.request(Method::POST, "products").multipart(form),
                "product",
            )
            .await?;
        self.api().invalidate_product(product.id).await;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Update a product. Without an image the current one is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is rejected or the API request fails.
    #[instrument(skip(self, input, image), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
        image: Option<ImageUpload>,
    ) -> Result<Product> {
        let form = input.to_form(image)?;
        let product: Product = self
            .send_data(
                self.request(Method::POST, &format!("products/{id}?_method=PUT"))
                    .multipart(form),
                "product",
            )
            .await?;
        self.api().invalidate_product(id).await;

        info!("Product updated");
        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.send_unit(self.request(Method::DELETE, &format!("products/{id}")))
            .await?;
        self.api().invalidate_product(id).await;

        info!("Product deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "Dried Mango".to_string(),
            description: None,
            category_id: CategoryId::new(3),
            price: Price::from_cents(1250),
            stock: 40,
        }
    }

    #[test]
    fn test_text_fields_match_form_layout() {
        let fields = input().text_fields();
        assert_eq!(
            fields.clone().map(|(name, _)| name),
            ["name", "description", "category_id", "price", "stock"]
        );
        assert_eq!(fields[1].1, "");
        assert_eq!(fields[2].1, "3");
        assert_eq!(fields[3].1, "12.50");
        assert_eq!(fields[4].1, "40");
    }

    #[test]
    fn test_image_mime_from_extension() {
        assert_eq!(ImageUpload::new("a.JPG", vec![1]).unwrap().mime(), "image/jpeg");
        assert_eq!(ImageUpload::new("a.webp", vec![1]).unwrap().mime(), "image/webp");
        assert!(matches!(
            ImageUpload::new("a.svg", vec![1]),
            Err(AdminError::UnsupportedImage(_))
        ));
        assert!(ImageUpload::new("noext", vec![1]).is_err());
    }

    #[test]
    fn test_form_builds_with_image() {
        let image = ImageUpload::new("mango.png", vec![0x89, 0x50]).unwrap();
        assert!(input().to_form(Some(image)).is_ok());
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let err = ImageUpload::from_path("/definitely/not/here.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::ImageRead { .. }));
    }
}
