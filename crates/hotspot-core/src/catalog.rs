//! Access Package Catalog
//!
//! Read-only list of purchasable access tiers. Owned by the operator;
//! the session core only looks up duration and price.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Purchasable access tier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessPackage {
    pub id: String,
    pub name: String,
    /// Price in KSh
    pub price: u32,
    pub duration_minutes: u32,
}

impl AccessPackage {
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Package catalog
pub struct PackageCatalog {
    packages: HashMap<String, AccessPackage>,
}

impl PackageCatalog {
    pub fn new() -> Self {
        let mut packages = HashMap::new();

        packages.insert("quick-browse".into(), AccessPackage {
            id: "quick-browse".into(),
            name: "Quick Browse".into(),
            price: 10,
            duration_minutes: 60,
        });

        packages.insert("half-day".into(), AccessPackage {
            id: "half-day".into(),
            name: "Half Day".into(),
            price: 25,
            duration_minutes: 180,
        });

        packages.insert("full-day".into(), AccessPackage {
            id: "full-day".into(),
            name: "Full Day".into(),
            price: 50,
            duration_minutes: 1440,
        });

        packages.insert("weekly".into(), AccessPackage {
            id: "weekly".into(),
            name: "Weekly".into(),
            price: 250,
            duration_minutes: 10080,
        });

        Self { packages }
    }

    pub fn get(&self, id: &str) -> Option<&AccessPackage> {
        self.packages.get(id)
    }

    pub fn list(&self) -> Vec<AccessPackage> {
        let mut list: Vec<AccessPackage> = self.packages.values().cloned().collect();
        list.sort_by_key(|p| p.duration_minutes);
        list
    }
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let catalog = PackageCatalog::new();

        assert!(catalog.get("quick-browse").is_some());
        assert!(catalog.get("weekly").is_some());
        assert!(catalog.get("nonexistent").is_none());
    }

    #[test]
    fn test_list_sorted_by_duration() {
        let catalog = PackageCatalog::new();
        let list = catalog.list();

        assert_eq!(list.first().map(|p| p.duration_minutes), Some(60));
        assert_eq!(list.last().map(|p| p.duration_minutes), Some(10080));
    }
}
