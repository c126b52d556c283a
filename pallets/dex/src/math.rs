//! Reserve arithmetic for constant-product pairs.
//!
//! Inputs and results are `u128`. Intermediate products are computed in 256 bits so that
//! reserves up to [`MAX_RESERVE`] never overflow, and every division floors.

use sp_core::U256;
use sp_runtime::ArithmeticError;

/// Reserves are bounded to 112 bits.
pub const MAX_RESERVE: u128 = (1u128 << 112) - 1;

/// Swap fees are expressed in thousandths.
pub const FEE_DENOMINATOR: u32 = 1_000;

fn narrow(value: U256) -> Result<u128, ArithmeticError> {
	if value.bits() > 128 {
		return Err(ArithmeticError::Overflow)
	}
	Ok(value.low_u128())
}

fn mul(a: U256, b: U256) -> Result<U256, ArithmeticError> {
	a.checked_mul(b).ok_or(ArithmeticError::Overflow)
}

fn div(a: U256, b: U256) -> Result<U256, ArithmeticError> {
	a.checked_div(b).ok_or(ArithmeticError::DivisionByZero)
}

fn fee_multiplier(fee: u32) -> Result<U256, ArithmeticError> {
	FEE_DENOMINATOR.checked_sub(fee).map(U256::from).ok_or(ArithmeticError::Underflow)
}

/// `floor(a * b / c)`.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, ArithmeticError> {
	narrow(div(mul(U256::from(a), U256::from(b))?, U256::from(c))?)
}

/// `floor(sqrt(a * b))`, used for the first deposit and for `sqrt(k)`.
pub fn sqrt_product(a: u128, b: u128) -> Result<u128, ArithmeticError> {
	narrow(mul(U256::from(a), U256::from(b))?.integer_sqrt())
}

/// LP shares for the first deposit into an empty pair.
pub fn initial_liquidity(amount_x: u128, amount_y: u128) -> Result<u128, ArithmeticError> {
	sqrt_product(amount_x, amount_y)
}

/// LP shares for a deposit into a pair with outstanding supply. The side giving fewer
/// shares wins, so depositing off-ratio donates the excess to existing holders.
pub fn proportional_liquidity(
	amount_x: u128,
	amount_y: u128,
	reserve_x: u128,
	reserve_y: u128,
	total_supply: u128,
) -> Result<u128, ArithmeticError> {
	let by_x = mul_div(amount_x, total_supply, reserve_x)?;
	let by_y = mul_div(amount_y, total_supply, reserve_y)?;
	Ok(by_x.min(by_y))
}

/// The part of `reserve` owed for redeeming `liquidity` out of `total_supply` shares.
pub fn redeem(liquidity: u128, reserve: u128, total_supply: u128) -> Result<u128, ArithmeticError> {
	mul_div(liquidity, reserve, total_supply)
}

/// Amount of the other asset equivalent to `amount_a` at the current reserve ratio.
pub fn quote(amount_a: u128, reserve_a: u128, reserve_b: u128) -> Result<u128, ArithmeticError> {
	mul_div(amount_a, reserve_b, reserve_a)
}

/// Output paid for exactly `amount_in` after the fee.
pub fn amount_out(
	amount_in: u128,
	reserve_in: u128,
	reserve_out: u128,
	fee: u32,
) -> Result<u128, ArithmeticError> {
	let amount_in_with_fee = mul(U256::from(amount_in), fee_multiplier(fee)?)?;
	let numerator = mul(amount_in_with_fee, U256::from(reserve_out))?;
	let denominator = mul(U256::from(reserve_in), U256::from(FEE_DENOMINATOR))?
		.checked_add(amount_in_with_fee)
		.ok_or(ArithmeticError::Overflow)?;
	narrow(div(numerator, denominator)?)
}

/// Smallest input that buys `amount_out`. Rounds up by one unit.
pub fn amount_in(
	amount_out: u128,
	reserve_in: u128,
	reserve_out: u128,
	fee: u32,
) -> Result<u128, ArithmeticError> {
	let remaining = reserve_out.checked_sub(amount_out).ok_or(ArithmeticError::Underflow)?;
	let numerator = mul(
		mul(U256::from(reserve_in), U256::from(amount_out))?,
		U256::from(FEE_DENOMINATOR),
	)?;
	let denominator = mul(U256::from(remaining), fee_multiplier(fee)?)?;
	narrow(div(numerator, denominator)?)?.checked_add(1).ok_or(ArithmeticError::Overflow)
}

/// The swap acceptance rule: with balances `b`, observed inputs `i` and prior reserves `r`,
/// `(bx*1000 - ix*fee) * (by*1000 - iy*fee) >= rx * ry * 1000^2`.
pub fn fee_adjusted_invariant_holds(
	balance_x: u128,
	balance_y: u128,
	amount_x_in: u128,
	amount_y_in: u128,
	reserve_x: u128,
	reserve_y: u128,
	fee: u32,
) -> Result<bool, ArithmeticError> {
	let scale = U256::from(FEE_DENOMINATOR);
	let adjusted = |balance: u128, input: u128| -> Result<U256, ArithmeticError> {
		mul(U256::from(balance), scale)?
			.checked_sub(mul(U256::from(input), U256::from(fee))?)
			.ok_or(ArithmeticError::Underflow)
	};
	let lhs = mul(adjusted(balance_x, amount_x_in)?, adjusted(balance_y, amount_y_in)?)?;
	let rhs = mul(mul(U256::from(reserve_x), U256::from(reserve_y))?, mul(scale, scale)?)?;
	Ok(lhs >= rhs)
}

/// LP shares owed to the protocol for the growth of `sqrt(k)` since the last snapshot:
/// `supply * (rootK - rootKLast) / (5 * rootK + rootKLast)`, a sixth of the growth.
pub fn protocol_fee_liquidity(
	total_supply: u128,
	reserve_x: u128,
	reserve_y: u128,
	last_x: u128,
	last_y: u128,
) -> Result<u128, ArithmeticError> {
	let root_k = U256::from(sqrt_product(reserve_x, reserve_y)?);
	let root_k_last = U256::from(sqrt_product(last_x, last_y)?);
	if root_k <= root_k_last {
		return Ok(0)
	}
	let numerator = mul(U256::from(total_supply), root_k - root_k_last)?;
	let denominator = mul(root_k, U256::from(5u8))?
		.checked_add(root_k_last)
		.ok_or(ArithmeticError::Overflow)?;
	narrow(div(numerator, denominator)?)
}
