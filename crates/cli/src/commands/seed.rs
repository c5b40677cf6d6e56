//! Demo data for local development.
//!
//! Safe to run repeatedly: categories and products are matched by name and
//! users by email, and anything already present is left untouched.

use thiserror::Error;

use hortifruti_core::db::{
    CategoryRepository, OrderRepository, ProductFilter, ProductInput, ProductRepository,
    RepositoryError, UserRepository,
};
use hortifruti_core::password::{PasswordError, hash_password};
use hortifruti_core::{CategoryId, Email, Price};

use super::{ConnectError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Invalid seed email: {0}")]
    InvalidEmail(&'static str),

    #[error("Seed product {product} references unknown category {category}")]
    UnknownCategory {
        product: &'static str,
        category: &'static str,
    },
}

struct SeedUser {
    name: &'static str,
    email: &'static str,
    password: &'static str,
    is_admin: bool,
}

struct SeedCategory {
    name: &'static str,
    description: &'static str,
    image: &'static str,
}

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price_cents: i64,
    category: &'static str,
    stock: i32,
    unit: &'static str,
    featured: bool,
    image: &'static str,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        name: "Administrador",
        email: "admin@hortifrutidelivery.com.br",
        password: "admin123",
        is_admin: true,
    },
    SeedUser {
        name: "Cliente Teste",
        email: "cliente@teste.com",
        password: "cliente123",
        is_admin: false,
    },
];

const CATEGORIES: &[SeedCategory] = &[
    SeedCategory {
        name: "Frutas",
        description: "Frutas frescas",
        image: "/static/images/categories/frutas.jpg",
    },
    SeedCategory {
        name: "Verduras",
        description: "Verduras frescas",
        image: "/static/images/categories/verduras.jpg",
    },
    SeedCategory {
        name: "Legumes",
        description: "Legumes frescos",
        image: "/static/images/categories/legumes.jpg",
    },
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        name: "Maçã",
        description: "Maçã fresca",
        price_cents: 599,
        category: "Frutas",
        stock: 100,
        unit: "kg",
        featured: true,
        image: "/static/images/products/maca.jpg",
    },
    SeedProduct {
        name: "Banana",
        description: "Banana fresca",
        price_cents: 499,
        category: "Frutas",
        stock: 100,
        unit: "kg",
        featured: true,
        image: "/static/images/products/banana.jpg",
    },
    SeedProduct {
        name: "Alface",
        description: "Alface fresca",
        price_cents: 299,
        category: "Verduras",
        stock: 50,
        unit: "un",
        featured: false,
        image: "/static/images/products/alface.jpg",
    },
    SeedProduct {
        name: "Cenoura",
        description: "Cenoura fresca",
        price_cents: 399,
        category: "Legumes",
        stock: 80,
        unit: "kg",
        featured: true,
        image: "/static/images/products/cenoura.jpg",
    },
];

impl SeedProduct {
    fn input(&self, category_id: CategoryId) -> ProductInput {
        ProductInput {
            name: self.name.to_owned(),
            description: Some(self.description.to_owned()),
            price: Price::from_cents(self.price_cents),
            image: Some(self.image.to_owned()),
            stock: self.stock,
            category_id: Some(category_id),
            unit: self.unit.to_owned(),
            discount: 0,
            organic: false,
            featured: self.featured,
            active: true,
        }
    }
}

/// Counts of inserted rows, for the final log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub categories: usize,
    pub products: usize,
}

/// Insert the demo data.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<SeedReport, SeedError> {
    let pool = connect().await?;
    let mut report = SeedReport::default();

    let users = UserRepository::new(&pool);
    for seed in USERS {
        let email = Email::parse(seed.email).map_err(|_| SeedError::InvalidEmail(seed.email))?;
        if users.get_by_email(&email).await?.is_some() {
            tracing::debug!(email = seed.email, "user exists, skipping");
            continue;
        }
        let password_hash = hash_password(seed.password)?;
        users
            .create(seed.name, &email, &password_hash, None, seed.is_admin)
            .await?;
        report.users += 1;
    }

    let categories = CategoryRepository::new(&pool);
    let existing = categories.list().await?;
    for seed in CATEGORIES {
        if existing.iter().any(|c| c.name == seed.name) {
            tracing::debug!(category = seed.name, "category exists, skipping");
            continue;
        }
        categories
            .create(seed.name, Some(seed.description), Some(seed.image))
            .await?;
        report.categories += 1;
    }

    let all_categories = categories.list().await?;
    let products = ProductRepository::new(&pool);
    let existing = products.list(&ProductFilter::default()).await?;
    for seed in PRODUCTS {
        if existing.iter().any(|p| p.name == seed.name) {
            tracing::debug!(product = seed.name, "product exists, skipping");
            continue;
        }
        let category = all_categories
            .iter()
            .find(|c| c.name == seed.category)
            .ok_or(SeedError::UnknownCategory {
                product: seed.name,
                category: seed.category,
            })?;
        products.create(&seed.input(category.id)).await?;
        report.products += 1;
    }

    tracing::info!(
        users = report.users,
        categories = report.categories,
        products = report.products,
        "Seed complete"
    );
    tracing::info!(
        products = products.count().await?,
        customers = users.count_customers().await?,
        orders = OrderRepository::new(&pool).count().await?,
        "Database totals"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use hortifruti_core::password::validate_password;

    #[test]
    fn test_seed_users_are_valid() {
        for user in USERS {
            assert!(Email::parse(user.email).is_ok(), "{}", user.email);
            assert!(validate_password(user.password).is_ok(), "{}", user.email);
        }
        assert!(USERS.iter().any(|u| u.is_admin));
    }

    #[test]
    fn test_seed_products_reference_seed_categories() {
        for product in PRODUCTS {
            assert!(
                CATEGORIES.iter().any(|c| c.name == product.category),
                "{}",
                product.name
            );
        }
    }

    #[test]
    fn test_seed_product_input() {
        let input = PRODUCTS.first().unwrap().input(CategoryId::new(1));
        assert_eq!(input.name, "Maçã");
        assert_eq!(input.price, Price::from_cents(599));
        assert_eq!(input.unit, "kg");
        assert!(input.featured);
        assert!(input.active);
        assert_eq!(input.discount, 0);
    }
}
