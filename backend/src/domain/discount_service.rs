//! Discount code administration and evaluation.

use std::sync::Arc;

use mockable::Clock;
use pagination::{Page, PageRequest};
use tracing::info;
use uuid::Uuid;

use crate::domain::ports::DiscountRepository;
use crate::domain::{
    Discount, DiscountDraft, DiscountQuote, DiscountRejection, DiscountRuleError, Error, Money,
    normalise_discount_code, validate_discount_value,
};

fn rule_error(err: DiscountRuleError) -> Error {
    let (field, code) = match &err {
        DiscountRuleError::InvalidCode => ("code", "invalid_code"),
        DiscountRuleError::PercentageOutOfRange => ("value", "percentage_out_of_range"),
        DiscountRuleError::NonPositiveAmount => ("value", "non_positive_amount"),
        DiscountRuleError::NegativeMinimum => ("minOrderAmount", "negative_minimum"),
        DiscountRuleError::NonPositiveLimit => ("usageLimit", "non_positive_limit"),
        DiscountRuleError::InvertedWindow => ("endsAt", "inverted_window"),
        DiscountRuleError::UnknownKind(_) => ("kind", "unknown_kind"),
    };
    Error::invalid_field(field, code, err.to_string())
}

/// Rejections are request errors tagged with the failing rule.
pub(crate) fn rejection_error(rejection: DiscountRejection) -> Error {
    Error::invalid_field("discountCode", rejection.code(), rejection.message())
}

/// Discount service.
#[derive(Clone)]
pub struct DiscountService {
    discounts: Arc<dyn DiscountRepository>,
    clock: Arc<dyn Clock>,
}

impl DiscountService {
    /// Create the service.
    pub fn new(discounts: Arc<dyn DiscountRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { discounts, clock }
    }

    fn build(&self, draft: DiscountDraft, base: Option<&Discount>) -> Result<Discount, Error> {
        let code = normalise_discount_code(&draft.code).map_err(rule_error)?;
        validate_discount_value(draft.kind, draft.value).map_err(rule_error)?;
        if draft.min_order_amount < 0 {
            return Err(rule_error(DiscountRuleError::NegativeMinimum));
        }
        if draft.usage_limit.is_some_and(|limit| limit <= 0) {
            return Err(rule_error(DiscountRuleError::NonPositiveLimit));
        }
        let now = self.clock.utc();
        let starts_at = draft
            .starts_at
            .or(base.map(|d| d.starts_at))
            .unwrap_or(now);
        if draft.ends_at.is_some_and(|ends| ends <= starts_at) {
            return Err(rule_error(DiscountRuleError::InvertedWindow));
        }
        Ok(Discount {
            id: base.map_or_else(Uuid::new_v4, |d| d.id),
            code,
            description: draft
                .description
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
            kind: draft.kind,
            value: draft.value,
            min_order_amount: draft.min_order_amount,
            starts_at,
            ends_at: draft.ends_at,
            usage_limit: draft.usage_limit,
            times_used: base.map_or(0, |d| d.times_used),
            is_active: draft.is_active,
            created_at: base.map_or(now, |d| d.created_at),
        })
    }

    /// Page through every discount.
    pub async fn list(&self, page: PageRequest) -> Result<Page<Discount>, Error> {
        let (items, total) = self.discounts.list(page).await?;
        Ok(Page::new(items, page, total))
    }

    /// Fetch one discount.
    pub async fn get(&self, id: Uuid) -> Result<Discount, Error> {
        self.discounts
            .find(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("discount {id} not found")))
    }

    /// Create a discount code.
    pub async fn create(&self, draft: DiscountDraft) -> Result<Discount, Error> {
        let discount = self.build(draft, None)?;
        self.discounts.insert(&discount).await?;
        info!(discount_id = %discount.id, code = %discount.code, "discount created");
        Ok(discount)
    }

    /// Replace a discount definition. The usage count is preserved.
    pub async fn update(&self, id: Uuid, draft: DiscountDraft) -> Result<Discount, Error> {
        let existing = self.get(id).await?;
        let discount = self.build(draft, Some(&existing))?;
        if !self.discounts.update(&discount).await? {
            return Err(Error::not_found(format!("discount {id} not found")));
        }
        Ok(discount)
    }

    /// Delete a discount code.
    pub async fn delete(&self, id: Uuid) -> Result<(), Error> {
        if !self.discounts.delete(id).await? {
            return Err(Error::not_found(format!("discount {id} not found")));
        }
        info!(discount_id = %id, "discount deleted");
        Ok(())
    }

    /// Check every rule for `code` against `subtotal` and return the
    /// discount with the amount it takes off.
    pub async fn evaluate(&self, code: &str, subtotal: Money) -> Result<(Discount, Money), Error> {
        let Ok(code) = normalise_discount_code(code) else {
            return Err(rejection_error(DiscountRejection::NotFound));
        };
        let discount = self
            .discounts
            .find_by_code(&code)
            .await?
            .ok_or_else(|| rejection_error(DiscountRejection::NotFound))?;
        let amount = discount
            .evaluate(subtotal, self.clock.utc())
            .map_err(rejection_error)?;
        Ok((discount, amount))
    }

    /// Preview a code against a subtotal.
    pub async fn validate(&self, code: &str, subtotal: Money) -> Result<DiscountQuote, Error> {
        if subtotal < 0 {
            return Err(Error::invalid_field(
                "subtotal",
                "negative_subtotal",
                "subtotal must not be negative",
            ));
        }
        let (discount, amount) = self.evaluate(code, subtotal).await?;
        Ok(DiscountQuote {
            code: discount.code,
            subtotal,
            discount_amount: amount,
            subtotal_after_discount: subtotal - amount,
        })
    }
}
