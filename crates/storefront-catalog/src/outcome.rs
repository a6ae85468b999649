use storefront_core::Product;

use crate::error::CatalogError;

/// Result of a catalog write.
///
/// Writes never fail outright: a rejected write hands back the input it was
/// given together with the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The record was written. `warnings` lists non-fatal failures such as
    /// assets that could not be deleted.
    Applied {
        product: Product,
        warnings: Vec<CatalogError>,
    },
    /// Nothing was written.
    Rejected { product: Product, error: CatalogError },
}

impl WriteOutcome {
    pub fn applied(product: Product) -> Self {
        Self::Applied {
            product,
            warnings: Vec::new(),
        }
    }

    pub fn rejected(product: Product, error: CatalogError) -> Self {
        Self::Rejected { product, error }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn product(&self) -> &Product {
        match self {
            Self::Applied { product, .. } | Self::Rejected { product, .. } => product,
        }
    }

    pub fn into_product(self) -> Product {
        match self {
            Self::Applied { product, .. } | Self::Rejected { product, .. } => product,
        }
    }

    pub fn error(&self) -> Option<&CatalogError> {
        match self {
            Self::Rejected { error, .. } => Some(error),
            Self::Applied { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[CatalogError] {
        match self {
            Self::Applied { warnings, .. } => warnings,
            Self::Rejected { .. } => &[],
        }
    }
}
