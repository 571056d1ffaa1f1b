//! Contributed CSS.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::runtime::OwnerScoped;

/// One stylesheet per owner, kept in first-registration order.
#[derive(Default)]
pub struct StyleRegistry {
    sheets: RwLock<Vec<(String, String)>>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stylesheet of `owner_id`. A second call replaces the first
    /// and keeps its position.
    pub async fn add(&self, owner_id: &str, css: &str) {
        let mut sheets = self.sheets.write().await;
        match sheets.iter_mut().find(|(owner, _)| owner == owner_id) {
            Some((_, existing)) => *existing = css.to_string(),
            None => sheets.push((owner_id.to_string(), css.to_string())),
        }
        debug!(owner = %owner_id, bytes = css.len(), "Styles added");
    }

    /// Removes the stylesheet of `owner_id`.
    pub async fn remove(&self, owner_id: &str) -> bool {
        let mut sheets = self.sheets.write().await;
        let before = sheets.len();
        sheets.retain(|(owner, _)| owner != owner_id);
        sheets.len() != before
    }

    /// Concatenates every sheet, separated by a blank line.
    pub async fn stylesheet(&self) -> String {
        let sheets = self.sheets.read().await;
        sheets
            .iter()
            .map(|(_, css)| css.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub async fn get(&self, owner_id: &str) -> Option<String> {
        let sheets = self.sheets.read().await;
        sheets
            .iter()
            .find(|(owner, _)| owner == owner_id)
            .map(|(_, css)| css.clone())
    }
}

#[async_trait]
impl OwnerScoped for StyleRegistry {
    fn registry_name(&self) -> &'static str {
        "styles"
    }

    async fn unregister_owner(&self, owner_id: &str) -> usize {
        usize::from(self.remove(owner_id).await)
    }

    async fn owned_count(&self, owner_id: &str) -> usize {
        usize::from(self.get(owner_id).await.is_some())
    }
}
