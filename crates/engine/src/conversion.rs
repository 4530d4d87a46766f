//! USDT <-> sAED fixed-point converter. USDT is tracked in micro-units
//! (10^6 = 1 USDT), sAED in fils (100 = 1 AED). Every conversion floors:
//! the platform never creates value rounding in a user's favor.

use {
    crate::error::ConversionError,
    bigdecimal::{BigDecimal, RoundingMode},
    chrono::{DateTime, Utc},
    database::{PgTransaction, balances, synthetic_conversions, types::EntityType},
    std::str::FromStr,
};

/// Exposure ceiling applied to the destination leg: a corridor account may
/// never carry more sAED than 90% of what its USDT balance, converted at the
/// current rate, would cover.
const EXPOSURE_FACTOR: &str = "0.9";

pub enum ConversionDirection {
    UsdtToSaed,
    SaedToUsdt,
}

pub struct ConvertInput {
    pub entity_type: EntityType,
    pub entity_id: uuid::Uuid,
    pub order_id: uuid::Uuid,
    pub direction: ConversionDirection,
    pub amount: BigDecimal,
    pub rate: BigDecimal,
    pub idempotency_key: Option<uuid::Uuid>,
}

pub struct ConvertOutcome {
    pub conversion_id: uuid::Uuid,
    pub from_amount: BigDecimal,
    pub to_amount: BigDecimal,
    pub replayed: bool,
}

/// `floor(usdt_balance * rate * 100 * 0.9)`, the default exposure ceiling on
/// the sAED leg for an account converting from USDT.
fn exposure_limit_fils(usdt_balance: &BigDecimal, rate: &BigDecimal) -> BigDecimal {
    let hundred = BigDecimal::from(100);
    let factor = BigDecimal::from_str(EXPOSURE_FACTOR).expect("valid decimal literal");
    (usdt_balance * rate * hundred * factor).with_scale_round(0, RoundingMode::Down)
}

pub async fn convert(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    input: ConvertInput,
    now: DateTime<Utc>,
) -> Result<ConvertOutcome, ConversionError> {
    if let Some(key) = input.idempotency_key
        && let Some(existing) =
            synthetic_conversions::find_by_id(ex, key).await.map_err(ConversionError::Database)?
    {
        return Ok(ConvertOutcome {
            conversion_id: existing.id,
            from_amount: existing.from_amount,
            to_amount: existing.to_amount,
            replayed: true,
        });
    }

    let balance = balances::lock_or_create(ex, input.entity_type, input.entity_id, now)
        .await
        .map_err(ConversionError::Database)?;

    let (from_currency, to_currency, to_amount) = match input.direction {
        ConversionDirection::UsdtToSaed => {
            if balance.usdt_balance < input.amount {
                return Err(ConversionError::InsufficientBalance);
            }
            let to_amount = (&input.amount * &input.rate * BigDecimal::from(100)).with_scale_round(0, RoundingMode::Down);
            let limit = exposure_limit_fils(&(&balance.usdt_balance - &input.amount), &input.rate);
            if &balance.sinr_balance + &to_amount > limit {
                return Err(ConversionError::ExposureLimitExceeded);
            }
            ("usdt", "saed", to_amount)
        }
        ConversionDirection::SaedToUsdt => {
            if balance.sinr_balance < input.amount {
                return Err(ConversionError::InsufficientBalance);
            }
            let to_amount = (&input.amount / (&input.rate * BigDecimal::from(100))).with_scale_round(0, RoundingMode::Down);
            ("saed", "usdt", to_amount)
        }
    };

    match input.direction {
        ConversionDirection::UsdtToSaed => {
            balances::adjust_usdt(ex, input.entity_type, input.entity_id, &(-&input.amount), now)
                .await
                .map_err(ConversionError::Database)?;
            balances::adjust_sinr(ex, input.entity_type, input.entity_id, &to_amount, now)
                .await
                .map_err(ConversionError::Database)?;
        }
        ConversionDirection::SaedToUsdt => {
            balances::adjust_sinr(ex, input.entity_type, input.entity_id, &(-&input.amount), now)
                .await
                .map_err(ConversionError::Database)?;
            balances::adjust_usdt(ex, input.entity_type, input.entity_id, &to_amount, now)
                .await
                .map_err(ConversionError::Database)?;
        }
    }

    let record = synthetic_conversions::insert(
        ex,
        id,
        input.order_id,
        from_currency,
        to_currency,
        &input.amount,
        &to_amount,
        &input.rate,
        now,
    )
    .await
    .map_err(ConversionError::Database)?;

    Ok(ConvertOutcome {
        conversion_id: record.id,
        from_amount: record.from_amount,
        to_amount: record.to_amount,
        replayed: false,
    })
}
