//! Constant-product pair primitives.
//!
//! Pairs never pull funds. Callers move assets into the pair account first; each primitive
//! then observes the difference between the account's balances and the recorded reserves.

use frame_support::ensure;
use frame_support::traits::fungibles::{Inspect, Mutate};
use frame_support::traits::tokens::{Fortitude, Precision, Preservation};
use sp_runtime::traits::{EnsureSub, Saturating, Zero};
use sp_runtime::{DispatchError, DispatchResult};

use crate::*;

impl<T: Config> Pallet<T> {
	/// Issues LP shares to `to` for the assets deposited into the pair account since the
	/// last reserve update.
	///
	/// The first deposit gets `floor(sqrt(x * y))` shares. Later deposits get the smaller of
	/// the two proportional amounts, so the off-ratio excess accrues to existing holders.
	///
	/// # Errors
	///
	/// * `PairNotFound` - if the pair is not registered.
	/// * `InsufficientLiquidityMinted` - if the deposit is worth zero shares.
	/// * `ReserveOverflow` - if a new reserve exceeds the 112-bit ceiling.
	pub fn do_mint(
		pair_id: &AssetIdPair<T>,
		to: &T::AccountId,
	) -> Result<AssetBalanceOf<T>, DispatchError> {
		let mut pair = Pairs::<T>::get(pair_id).ok_or(Error::<T>::PairNotFound)?;
		let account = Self::pair_account_id(pair_id);
		let (reserve_x, reserve_y) = pair.reserves();
		let (balance_x, balance_y) = Self::pair_balances(pair_id, &account);
		let amount_x = balance_x.ensure_sub(reserve_x)?;
		let amount_y = balance_y.ensure_sub(reserve_y)?;

		let fee_on = Self::mint_protocol_fee(&mut pair, reserve_x, reserve_y)?;
		let total_supply = T::Fungibles::total_issuance(pair.lp_token_id);
		let liquidity = if total_supply.is_zero() {
			math::initial_liquidity(
				Self::balance_to_u128(amount_x)?,
				Self::balance_to_u128(amount_y)?,
			)
		} else {
			math::proportional_liquidity(
				Self::balance_to_u128(amount_x)?,
				Self::balance_to_u128(amount_y)?,
				Self::balance_to_u128(reserve_x)?,
				Self::balance_to_u128(reserve_y)?,
				Self::balance_to_u128(total_supply)?,
			)
		}
		.map_err(Error::<T>::from)?;
		let liquidity = Self::u128_to_balance(liquidity)?;
		ensure!(!liquidity.is_zero(), Error::<T>::InsufficientLiquidityMinted);

		T::Fungibles::mint_into(pair.lp_token_id, to, liquidity)?;
		Self::update_reserves(&mut pair, balance_x, balance_y)?;
		if fee_on {
			pair.k_last = Some((balance_x, balance_y));
		}
		Pairs::<T>::insert(pair_id, pair);

		Self::deposit_event(Event::Minted {
			pair: *pair_id,
			to: to.clone(),
			deposited: AssetAmountPair::new(*pair_id, amount_x, amount_y),
			liquidity,
		});
		Ok(liquidity)
	}

	/// Redeems every LP share currently held by the pair account and pays the pro-rata
	/// reserves to `to`. Returns the amounts paid in canonical order.
	///
	/// # Errors
	///
	/// * `PairNotFound` - if the pair is not registered.
	/// * `InsufficientLiquidityBurned` - if either payout rounds down to zero.
	pub fn do_burn(
		pair_id: &AssetIdPair<T>,
		to: &T::AccountId,
	) -> Result<(AssetBalanceOf<T>, AssetBalanceOf<T>), DispatchError> {
		let mut pair = Pairs::<T>::get(pair_id).ok_or(Error::<T>::PairNotFound)?;
		let account = Self::pair_account_id(pair_id);
		let (reserve_x, reserve_y) = pair.reserves();
		let liquidity = T::Fungibles::balance(pair.lp_token_id, &account);

		let fee_on = Self::mint_protocol_fee(&mut pair, reserve_x, reserve_y)?;
		let total_supply = T::Fungibles::total_issuance(pair.lp_token_id);
		ensure!(!liquidity.is_zero(), Error::<T>::InsufficientLiquidityBurned);

		let amount_x = Self::redeem(liquidity, reserve_x, total_supply)?;
		let amount_y = Self::redeem(liquidity, reserve_y, total_supply)?;
		ensure!(
			!amount_x.is_zero() && !amount_y.is_zero(),
			Error::<T>::InsufficientLiquidityBurned
		);

		T::Fungibles::burn_from(
			pair.lp_token_id,
			&account,
			liquidity,
			Precision::Exact,
			Fortitude::Polite,
		)?;
		T::Fungibles::transfer(
			pair_id.asset_x(),
			&account,
			to,
			amount_x,
			Preservation::Expendable,
		)?;
		T::Fungibles::transfer(
			pair_id.asset_y(),
			&account,
			to,
			amount_y,
			Preservation::Expendable,
		)?;

		let (balance_x, balance_y) = Self::pair_balances(pair_id, &account);
		Self::update_reserves(&mut pair, balance_x, balance_y)?;
		if fee_on {
			pair.k_last = Some((balance_x, balance_y));
		}
		Pairs::<T>::insert(pair_id, pair);

		Self::deposit_event(Event::Burned {
			pair: *pair_id,
			to: to.clone(),
			withdrawn: AssetAmountPair::new(*pair_id, amount_x, amount_y),
			liquidity,
		});
		Ok((amount_x, amount_y))
	}

	/// Pays `amount_x_out` and `amount_y_out` (canonical order) to `to`, then accepts the
	/// swap only if the input observed in the pair account keeps the fee-adjusted reserve
	/// product from decreasing.
	///
	/// # Errors
	///
	/// * `InsufficientOutputAmount` - if both outputs are zero.
	/// * `InsufficientLiquidity` - if an output is not below its reserve.
	/// * `InsufficientInputAmount` - if nothing was deposited.
	/// * `InvariantViolation` - if the input does not pay for the output.
	pub fn do_swap(
		pair_id: &AssetIdPair<T>,
		amount_x_out: AssetBalanceOf<T>,
		amount_y_out: AssetBalanceOf<T>,
		to: &T::AccountId,
	) -> DispatchResult {
		ensure!(
			!amount_x_out.is_zero() || !amount_y_out.is_zero(),
			Error::<T>::InsufficientOutputAmount
		);
		let mut pair = Pairs::<T>::get(pair_id).ok_or(Error::<T>::PairNotFound)?;
		let (reserve_x, reserve_y) = pair.reserves();
		ensure!(
			amount_x_out < reserve_x && amount_y_out < reserve_y,
			Error::<T>::InsufficientLiquidity
		);

		let account = Self::pair_account_id(pair_id);
		if !amount_x_out.is_zero() {
			T::Fungibles::transfer(
				pair_id.asset_x(),
				&account,
				to,
				amount_x_out,
				Preservation::Expendable,
			)?;
		}
		if !amount_y_out.is_zero() {
			T::Fungibles::transfer(
				pair_id.asset_y(),
				&account,
				to,
				amount_y_out,
				Preservation::Expendable,
			)?;
		}

		let (balance_x, balance_y) = Self::pair_balances(pair_id, &account);
		let amount_x_in = balance_x.saturating_sub(reserve_x.saturating_sub(amount_x_out));
		let amount_y_in = balance_y.saturating_sub(reserve_y.saturating_sub(amount_y_out));
		ensure!(
			!amount_x_in.is_zero() || !amount_y_in.is_zero(),
			Error::<T>::InsufficientInputAmount
		);

		Self::ensure_within_reserve_bound(balance_x, balance_y)?;
		let holds = math::fee_adjusted_invariant_holds(
			Self::balance_to_u128(balance_x)?,
			Self::balance_to_u128(balance_y)?,
			Self::balance_to_u128(amount_x_in)?,
			Self::balance_to_u128(amount_y_in)?,
			Self::balance_to_u128(reserve_x)?,
			Self::balance_to_u128(reserve_y)?,
			T::LpFee::get(),
		)
		.map_err(Error::<T>::from)?;
		ensure!(holds, Error::<T>::InvariantViolation);

		Self::update_reserves(&mut pair, balance_x, balance_y)?;
		Pairs::<T>::insert(pair_id, pair);

		log::trace!(
			target: LOG_TARGET,
			"swap on {:?}: in ({:?}, {:?}) out ({:?}, {:?})",
			pair_id,
			amount_x_in,
			amount_y_in,
			amount_x_out,
			amount_y_out,
		);
		Self::deposit_event(Event::Swapped {
			pair: *pair_id,
			to: to.clone(),
			amount_in: AssetAmountPair::new(*pair_id, amount_x_in, amount_y_in),
			amount_out: AssetAmountPair::new(*pair_id, amount_x_out, amount_y_out),
		});
		Ok(())
	}

	/// Sends whatever the pair account holds above its reserves to `to`.
	pub fn do_skim(pair_id: &AssetIdPair<T>, to: &T::AccountId) -> DispatchResult {
		let pair = Pairs::<T>::get(pair_id).ok_or(Error::<T>::PairNotFound)?;
		let account = Self::pair_account_id(pair_id);
		let (reserve_x, reserve_y) = pair.reserves();
		let (balance_x, balance_y) = Self::pair_balances(pair_id, &account);

		let excess_x = balance_x.saturating_sub(reserve_x);
		let excess_y = balance_y.saturating_sub(reserve_y);
		for (asset, excess) in [(pair_id.asset_x(), excess_x), (pair_id.asset_y(), excess_y)] {
			if !excess.is_zero() {
				T::Fungibles::transfer(asset, &account, to, excess, Preservation::Expendable)?;
			}
		}

		Self::deposit_event(Event::Skimmed {
			pair: *pair_id,
			to: to.clone(),
			amounts: AssetAmountPair::new(*pair_id, excess_x, excess_y),
		});
		Ok(())
	}

	/// Sets the reserves to the pair account's current balances.
	pub fn do_sync(pair_id: &AssetIdPair<T>) -> DispatchResult {
		let mut pair = Pairs::<T>::get(pair_id).ok_or(Error::<T>::PairNotFound)?;
		let account = Self::pair_account_id(pair_id);
		let (balance_x, balance_y) = Self::pair_balances(pair_id, &account);
		Self::update_reserves(&mut pair, balance_x, balance_y)?;
		Pairs::<T>::insert(pair_id, pair);

		Self::deposit_event(Event::Synced {
			pair: *pair_id,
			reserves: AssetAmountPair::new(*pair_id, balance_x, balance_y),
		});
		Ok(())
	}

	/// Mints the protocol's share of fee growth to `FeeTo`, if set. Returns whether the
	/// protocol fee is on, in which case the caller must refresh `k_last`.
	fn mint_protocol_fee(
		pair: &mut PairInfo<T>,
		reserve_x: AssetBalanceOf<T>,
		reserve_y: AssetBalanceOf<T>,
	) -> Result<bool, DispatchError> {
		let Some(fee_to) = FeeTo::<T>::get() else {
			pair.k_last = None;
			return Ok(false)
		};
		if let Some((last_x, last_y)) = pair.k_last {
			let liquidity = math::protocol_fee_liquidity(
				Self::balance_to_u128(T::Fungibles::total_issuance(pair.lp_token_id))?,
				Self::balance_to_u128(reserve_x)?,
				Self::balance_to_u128(reserve_y)?,
				Self::balance_to_u128(last_x)?,
				Self::balance_to_u128(last_y)?,
			)
			.map_err(Error::<T>::from)?;
			let liquidity = Self::u128_to_balance(liquidity)?;
			if !liquidity.is_zero() {
				T::Fungibles::mint_into(pair.lp_token_id, &fee_to, liquidity)?;
				log::debug!(target: LOG_TARGET, "minted {:?} protocol-fee shares", liquidity);
			}
		}
		Ok(true)
	}

	fn redeem(
		liquidity: AssetBalanceOf<T>,
		reserve: AssetBalanceOf<T>,
		total_supply: AssetBalanceOf<T>,
	) -> Result<AssetBalanceOf<T>, Error<T>> {
		let amount = math::redeem(
			Self::balance_to_u128(liquidity)?,
			Self::balance_to_u128(reserve)?,
			Self::balance_to_u128(total_supply)?,
		)?;
		Self::u128_to_balance(amount)
	}

	fn pair_balances(
		pair_id: &AssetIdPair<T>,
		account: &T::AccountId,
	) -> (AssetBalanceOf<T>, AssetBalanceOf<T>) {
		(
			T::Fungibles::balance(pair_id.asset_x(), account),
			T::Fungibles::balance(pair_id.asset_y(), account),
		)
	}

	fn update_reserves(
		pair: &mut PairInfo<T>,
		balance_x: AssetBalanceOf<T>,
		balance_y: AssetBalanceOf<T>,
	) -> Result<(), Error<T>> {
		Self::ensure_within_reserve_bound(balance_x, balance_y)?;
		pair.reserves.amount_x.balance = balance_x;
		pair.reserves.amount_y.balance = balance_y;
		Ok(())
	}

	fn ensure_within_reserve_bound(
		balance_x: AssetBalanceOf<T>,
		balance_y: AssetBalanceOf<T>,
	) -> Result<(), Error<T>> {
		ensure!(
			Self::balance_to_u128(balance_x)? <= math::MAX_RESERVE &&
				Self::balance_to_u128(balance_y)? <= math::MAX_RESERVE,
			Error::<T>::ReserveOverflow
		);
		Ok(())
	}
}
