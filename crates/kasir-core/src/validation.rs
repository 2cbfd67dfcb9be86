//! # Validation Module
//!
//! Input validation for Kasir payloads.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (outside this repo)                            │
//! │  ├── DTO shape checks (deserialization)                                │
//! │  └── Immediate 400 feedback                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Field rules (required, length, sign)                              │
//! │  └── Cart rules (non-empty, quantity ≥ 1, tax/discount ≥ 0)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0)                                                │
//! │  ├── UNIQUE (sku), UNIQUE (transaction_number)                         │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kasir_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("KOPI-01").unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::input::{
    BulkProductUpdate, CategoryUpdate, CreateSaleRequest, CustomerUpdate, NewCategory,
    NewCustomer, NewProduct, NewUser, ProductUpdate,
};
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of free-text notes on a sale.
pub const MAX_NOTES_LEN: usize = 500;

/// Maximum lines in a single sale.
///
/// Keeps one checkout inside a single bulk item insert.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on one cart line (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use kasir_core::validation::validate_sku;
///
/// assert!(validate_sku("KOPI-01").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, category, customer, user).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a search query. Returns the trimmed query, `None` when blank.
pub fn validate_search_query(query: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok(None);
    };

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(Some(query.to_string()))
}

/// Minimal email shape check: `local@domain` with a dot in the domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let valid = match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }

    Ok(())
}

/// Hex color such as `#10B981`.
pub fn validate_color(color: &str) -> ValidationResult<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if !(hex.len() == 6 || hex.len() == 3) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat {
            field: "color".to_string(),
            reason: "must be a hex color like #10B981".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout: cart line { productId, quantity: 0 }                         │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(0) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → stock availability check                                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount that may be zero but never negative
/// (price, cost, tax, discount).
///
/// ```rust
/// use kasir_core::{Money, validation::validate_non_negative_amount};
///
/// assert!(validate_non_negative_amount("price", Money::from_cents(1099)).is_ok());
/// assert!(validate_non_negative_amount("price", Money::zero()).is_ok());
/// assert!(validate_non_negative_amount("price", Money::from_cents(-100)).is_err());
/// ```
pub fn validate_non_negative_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Stock counts and thresholds.
pub fn validate_non_negative_count(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Payload Validators
// =============================================================================

/// Validates a checkout payload before any storage access.
///
/// Product existence and stock are checked later, against storage.
pub fn validate_sale_request(request: &CreateSaleRequest) -> ValidationResult<()> {
    if request.items.is_empty() {
        return Err(ValidationError::required("items"));
    }
    if request.items.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    for item in &request.items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::required("productId"));
        }
        validate_quantity(item.quantity)?;
    }

    if let Some(tax) = request.tax {
        validate_non_negative_amount("tax", tax)?;
    }
    if let Some(discount) = request.discount {
        validate_non_negative_amount("discount", discount)?;
    }
    if let Some(customer_id) = &request.customer_id {
        if customer_id.trim().is_empty() {
            return Err(ValidationError::required("customerId"));
        }
    }
    if let Some(notes) = &request.notes {
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(ValidationError::TooLong {
                field: "notes".to_string(),
                max: MAX_NOTES_LEN,
            });
        }
    }

    Ok(())
}

pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_sku(&product.sku)?;
    validate_name("name", &product.name)?;
    validate_non_negative_amount("price", product.price)?;
    if let Some(cost) = product.cost {
        validate_non_negative_amount("cost", cost)?;
    }
    validate_non_negative_count("stock", product.stock)?;
    validate_non_negative_count("minStock", product.min_stock)?;
    Ok(())
}

pub fn validate_product_update(update: &ProductUpdate) -> ValidationResult<()> {
    if let Some(sku) = &update.sku {
        validate_sku(sku)?;
    }
    if let Some(name) = &update.name {
        validate_name("name", name)?;
    }
    if let Some(price) = update.price {
        validate_non_negative_amount("price", price)?;
    }
    if let Some(Some(cost)) = update.cost {
        validate_non_negative_amount("cost", cost)?;
    }
    if let Some(stock) = update.stock {
        validate_non_negative_count("stock", stock)?;
    }
    if let Some(min_stock) = update.min_stock {
        validate_non_negative_count("minStock", min_stock)?;
    }
    Ok(())
}

pub fn validate_bulk_update(update: &BulkProductUpdate) -> ValidationResult<()> {
    if update.ids.is_empty() {
        return Err(ValidationError::required("ids"));
    }
    if let Some(price) = update.price {
        validate_non_negative_amount("price", price)?;
    }
    if let Some(stock) = update.stock {
        validate_non_negative_count("stock", stock)?;
    }
    Ok(())
}

pub fn validate_new_category(category: &NewCategory) -> ValidationResult<()> {
    validate_name("name", &category.name)?;
    if let Some(color) = &category.color {
        validate_color(color)?;
    }
    Ok(())
}

pub fn validate_category_update(update: &CategoryUpdate) -> ValidationResult<()> {
    if let Some(name) = &update.name {
        validate_name("name", name)?;
    }
    if let Some(Some(color)) = &update.color {
        validate_color(color)?;
    }
    Ok(())
}

pub fn validate_new_customer(customer: &NewCustomer) -> ValidationResult<()> {
    validate_name("name", &customer.name)?;
    if let Some(email) = &customer.email {
        validate_email(email)?;
    }
    Ok(())
}

pub fn validate_customer_update(update: &CustomerUpdate) -> ValidationResult<()> {
    if let Some(name) = &update.name {
        validate_name("name", name)?;
    }
    if let Some(Some(email)) = &update.email {
        validate_email(email)?;
    }
    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> ValidationResult<()> {
    validate_name("fullName", &user.full_name)?;
    validate_email(&user.email)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::CartItem;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("KOPI-01").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Kopi Susu Gula Aren").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query(None).unwrap(), None);
        assert_eq!(validate_search_query(Some("   ")).unwrap(), None);
        assert_eq!(
            validate_search_query(Some(" kopi ")).unwrap().as_deref(),
            Some("kopi")
        );
        assert!(validate_search_query(Some(&"x".repeat(101))).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(matches!(
            validate_quantity(MAX_ITEM_QUANTITY + 1),
            Err(ValidationError::OutOfRange { max: 999, .. })
        ));
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_email_and_color() {
        assert!(validate_email("budi@example.com").is_ok());
        assert!(validate_email("budi").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_color("#10B981").is_ok());
        assert!(validate_color("#fff").is_ok());
        assert!(validate_color("10B981").is_err());
        assert!(validate_color("#GGGGGG").is_err());
    }

    #[test]
    fn test_validate_sale_request() {
        let ok = CreateSaleRequest::cash(vec![CartItem::new("p-1", 2)]);
        assert!(validate_sale_request(&ok).is_ok());

        let empty = CreateSaleRequest::cash(vec![]);
        assert!(matches!(
            validate_sale_request(&empty),
            Err(ValidationError::Required { .. })
        ));

        let zero_qty = CreateSaleRequest::cash(vec![CartItem::new("p-1", 0)]);
        assert!(validate_sale_request(&zero_qty).is_err());

        let full = CreateSaleRequest::cash(vec![CartItem::new("p-1", 1); MAX_CART_ITEMS]);
        assert!(validate_sale_request(&full).is_ok());

        let oversized = CreateSaleRequest::cash(vec![CartItem::new("p-1", 1); MAX_CART_ITEMS + 1]);
        assert!(matches!(
            validate_sale_request(&oversized),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "items"
        ));

        let negative_discount = CreateSaleRequest::cash(vec![CartItem::new("p-1", 1)])
            .with_discount(Money::from_cents(-1));
        assert!(matches!(
            validate_sale_request(&negative_discount),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
    }

    #[test]
    fn test_validate_product_update() {
        let update = ProductUpdate {
            stock: Some(-1),
            ..Default::default()
        };
        assert!(validate_product_update(&update).is_err());

        let update = ProductUpdate {
            cost: Some(None),
            price: Some(Money::from_cents(500)),
            ..Default::default()
        };
        assert!(validate_product_update(&update).is_ok());
    }
}
