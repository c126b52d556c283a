//! Router: the user-facing entry points that move funds into pairs and chain swaps.

use frame_support::ensure;
use frame_support::traits::fungibles::Mutate;
use frame_support::traits::tokens::Preservation;
use frame_system::pallet_prelude::BlockNumberFor;
use sp_runtime::traits::Zero;
use sp_runtime::{DispatchError, DispatchResult};
use sp_std::collections::btree_map::BTreeMap;
use sp_std::collections::btree_set::BTreeSet;
use sp_std::collections::vec_deque::VecDeque;
use sp_std::vec;
use sp_std::vec::Vec;

use crate::*;

impl<T: Config> Pallet<T> {
	pub(crate) fn ensure_deadline(deadline: BlockNumberFor<T>) -> Result<(), Error<T>> {
		ensure!(
			frame_system::Pallet::<T>::block_number() <= deadline,
			Error::<T>::DeadlineExpired
		);
		Ok(())
	}

	/// Deposits into the pair of `asset_x_id` and `asset_y_id`, creating it if needed, and
	/// mints the LP shares to `to`.
	///
	/// Returns the amounts taken, in the caller's order, and the shares minted.
	///
	/// # Errors
	///
	/// * `SlippageExceeded` - if the amount taken on either side is below its minimum.
	/// * Any error of pair creation or of [`Self::do_mint`].
	#[allow(clippy::too_many_arguments)]
	pub fn do_add_liquidity(
		who: &T::AccountId,
		asset_x_id: T::DexAssetId,
		asset_y_id: T::DexAssetId,
		amount_x_desired: AssetBalanceOf<T>,
		amount_y_desired: AssetBalanceOf<T>,
		amount_x_min: AssetBalanceOf<T>,
		amount_y_min: AssetBalanceOf<T>,
		to: &T::AccountId,
	) -> Result<(AssetBalanceOf<T>, AssetBalanceOf<T>, AssetBalanceOf<T>), DispatchError> {
		let pair_id = AssetIdPair::<T>::new(asset_x_id, asset_y_id)?;
		if !Pairs::<T>::contains_key(pair_id) {
			Self::do_create_pair(who, asset_x_id, asset_y_id)?;
		}

		let (reserve_x, reserve_y) = Self::get_reserves(asset_x_id, asset_y_id)?;
		let (amount_x, amount_y) = if reserve_x.is_zero() && reserve_y.is_zero() {
			(amount_x_desired, amount_y_desired)
		} else {
			let amount_y_optimal = Self::quote(amount_x_desired, reserve_x, reserve_y)?;
			if amount_y_optimal <= amount_y_desired {
				ensure!(amount_y_optimal >= amount_y_min, Error::<T>::SlippageExceeded);
				(amount_x_desired, amount_y_optimal)
			} else {
				let amount_x_optimal = Self::quote(amount_y_desired, reserve_y, reserve_x)?;
				ensure!(amount_x_optimal <= amount_x_desired, Error::<T>::SlippageExceeded);
				ensure!(amount_x_optimal >= amount_x_min, Error::<T>::SlippageExceeded);
				(amount_x_optimal, amount_y_desired)
			}
		};
		ensure!(
			amount_x >= amount_x_min && amount_y >= amount_y_min,
			Error::<T>::SlippageExceeded
		);

		let pair_account = Self::pair_account_id(&pair_id);
		T::Fungibles::transfer(
			asset_x_id,
			who,
			&pair_account,
			amount_x,
			Preservation::Expendable,
		)?;
		T::Fungibles::transfer(
			asset_y_id,
			who,
			&pair_account,
			amount_y,
			Preservation::Expendable,
		)?;
		let liquidity = Self::do_mint(&pair_id, to)?;

		let (canonical_x, canonical_y) = Self::orient(&pair_id, asset_x_id, amount_x, amount_y);
		Self::deposit_event(Event::LiquidityAdded {
			who: who.clone(),
			to: to.clone(),
			provided: AssetAmountPair::new(pair_id, canonical_x, canonical_y),
			liquidity,
		});
		Ok((amount_x, amount_y, liquidity))
	}

	/// Returns `liquidity` LP shares of `who` to their pair, burns them and sends both
	/// reserves to `to`. Returns the amounts received in the caller's order.
	///
	/// # Errors
	///
	/// * `SlippageExceeded` - if the amount received on either side is below its minimum.
	/// * Any error of [`Self::do_burn`].
	#[allow(clippy::too_many_arguments)]
	pub fn do_remove_liquidity(
		who: &T::AccountId,
		asset_x_id: T::DexAssetId,
		asset_y_id: T::DexAssetId,
		liquidity: AssetBalanceOf<T>,
		amount_x_min: AssetBalanceOf<T>,
		amount_y_min: AssetBalanceOf<T>,
		to: &T::AccountId,
	) -> Result<(AssetBalanceOf<T>, AssetBalanceOf<T>), DispatchError> {
		ensure!(!liquidity.is_zero(), Error::<T>::ZeroAmount);
		let pair_id = AssetIdPair::<T>::new(asset_x_id, asset_y_id)?;
		let pair = Pairs::<T>::get(pair_id).ok_or(Error::<T>::PairNotFound)?;

		let pair_account = Self::pair_account_id(&pair_id);
		T::Fungibles::transfer(
			pair.lp_token_id,
			who,
			&pair_account,
			liquidity,
			Preservation::Expendable,
		)?;
		let (canonical_x, canonical_y) = Self::do_burn(&pair_id, to)?;

		let (amount_x, amount_y) = Self::orient(&pair_id, asset_x_id, canonical_x, canonical_y);
		ensure!(
			amount_x >= amount_x_min && amount_y >= amount_y_min,
			Error::<T>::SlippageExceeded
		);

		Self::deposit_event(Event::LiquidityRemoved {
			who: who.clone(),
			to: to.clone(),
			removed: AssetAmountPair::new(pair_id, canonical_x, canonical_y),
			liquidity,
		});
		Ok((amount_x, amount_y))
	}

	/// Swaps exactly `amount_in` of `path[0]` hop by hop, sending the last asset to `to`.
	/// Returns the amount of every asset along the path.
	///
	/// # Errors
	///
	/// * `InvalidPath` - if the path is shorter than 2 or longer than the configured maximum.
	/// * `SlippageExceeded` - if the final output is below `amount_out_min`.
	pub fn do_swap_exact_tokens_for_tokens(
		who: &T::AccountId,
		path: &[T::DexAssetId],
		amount_in: AssetBalanceOf<T>,
		amount_out_min: AssetBalanceOf<T>,
		to: &T::AccountId,
	) -> Result<Vec<AssetBalanceOf<T>>, DispatchError> {
		ensure!(!amount_in.is_zero(), Error::<T>::ZeroAmount);
		Self::validate_path(path)?;

		let amounts = Self::get_amounts_out(amount_in, path)?;
		let amount_out = *amounts.last().ok_or(Error::<T>::InvalidPath)?;
		ensure!(amount_out >= amount_out_min, Error::<T>::SlippageExceeded);

		Self::execute_swap(who, path, &amounts, to)?;
		Ok(amounts)
	}

	/// Swaps as little of `path[0]` as needed to deliver exactly `amount_out` of the last
	/// asset to `to`. Returns the amount of every asset along the path.
	///
	/// # Errors
	///
	/// * `InvalidPath` - if the path is shorter than 2 or longer than the configured maximum.
	/// * `SlippageExceeded` - if the required input is above `amount_in_max`.
	pub fn do_swap_tokens_for_exact_tokens(
		who: &T::AccountId,
		path: &[T::DexAssetId],
		amount_out: AssetBalanceOf<T>,
		amount_in_max: AssetBalanceOf<T>,
		to: &T::AccountId,
	) -> Result<Vec<AssetBalanceOf<T>>, DispatchError> {
		ensure!(!amount_out.is_zero(), Error::<T>::ZeroAmount);
		Self::validate_path(path)?;

		let amounts = Self::get_amounts_in(amount_out, path)?;
		let amount_in = *amounts.first().ok_or(Error::<T>::InvalidPath)?;
		ensure!(amount_in <= amount_in_max, Error::<T>::SlippageExceeded);

		Self::execute_swap(who, path, &amounts, to)?;
		Ok(amounts)
	}

	/// Output of a single hop for exactly `amount_in`.
	pub fn get_amount_out(
		amount_in: AssetBalanceOf<T>,
		reserve_in: AssetBalanceOf<T>,
		reserve_out: AssetBalanceOf<T>,
	) -> Result<AssetBalanceOf<T>, Error<T>> {
		ensure!(!amount_in.is_zero(), Error::<T>::InsufficientInputAmount);
		ensure!(!reserve_in.is_zero() && !reserve_out.is_zero(), Error::<T>::InsufficientLiquidity);
		let amount_out = math::amount_out(
			Self::balance_to_u128(amount_in)?,
			Self::balance_to_u128(reserve_in)?,
			Self::balance_to_u128(reserve_out)?,
			T::LpFee::get(),
		)?;
		Self::u128_to_balance(amount_out)
	}

	/// Input a single hop needs to pay out exactly `amount_out`.
	pub fn get_amount_in(
		amount_out: AssetBalanceOf<T>,
		reserve_in: AssetBalanceOf<T>,
		reserve_out: AssetBalanceOf<T>,
	) -> Result<AssetBalanceOf<T>, Error<T>> {
		ensure!(!amount_out.is_zero(), Error::<T>::InsufficientOutputAmount);
		ensure!(!reserve_in.is_zero() && !reserve_out.is_zero(), Error::<T>::InsufficientLiquidity);
		ensure!(amount_out < reserve_out, Error::<T>::InsufficientLiquidity);
		let amount_in = math::amount_in(
			Self::balance_to_u128(amount_out)?,
			Self::balance_to_u128(reserve_in)?,
			Self::balance_to_u128(reserve_out)?,
			T::LpFee::get(),
		)?;
		Self::u128_to_balance(amount_in)
	}

	/// Amounts along `path` for an exact input, from current reserves.
	pub fn get_amounts_out(
		amount_in: AssetBalanceOf<T>,
		path: &[T::DexAssetId],
	) -> Result<Vec<AssetBalanceOf<T>>, Error<T>> {
		ensure!(path.len() >= 2, Error::<T>::InvalidPath);
		let mut amounts = Vec::with_capacity(path.len());
		amounts.push(amount_in);
		let mut amount = amount_in;
		for hop in path.windows(2) {
			let (reserve_in, reserve_out) = Self::get_reserves(hop[0], hop[1])?;
			amount = Self::get_amount_out(amount, reserve_in, reserve_out)?;
			amounts.push(amount);
		}
		Ok(amounts)
	}

	/// Amounts along `path` for an exact output, from current reserves.
	pub fn get_amounts_in(
		amount_out: AssetBalanceOf<T>,
		path: &[T::DexAssetId],
	) -> Result<Vec<AssetBalanceOf<T>>, Error<T>> {
		ensure!(path.len() >= 2, Error::<T>::InvalidPath);
		let mut amounts = vec![amount_out];
		let mut amount = amount_out;
		for hop in path.windows(2).rev() {
			let (reserve_in, reserve_out) = Self::get_reserves(hop[0], hop[1])?;
			amount = Self::get_amount_in(amount, reserve_in, reserve_out)?;
			amounts.push(amount);
		}
		amounts.reverse();
		Ok(amounts)
	}

	/// Reserves of the pair of `asset_a` and `asset_b`, in that order.
	pub fn get_reserves(
		asset_a: T::DexAssetId,
		asset_b: T::DexAssetId,
	) -> Result<(AssetBalanceOf<T>, AssetBalanceOf<T>), Error<T>> {
		let pair_id = AssetIdPair::<T>::new(asset_a, asset_b)?;
		let pair = Pairs::<T>::get(pair_id).ok_or(Error::<T>::PairNotFound)?;
		let (reserve_x, reserve_y) = pair.reserves();
		Ok(Self::orient(&pair_id, asset_a, reserve_x, reserve_y))
	}

	/// Amount of `B` equivalent to `amount_a` of `A` at the reserve ratio.
	pub fn quote(
		amount_a: AssetBalanceOf<T>,
		reserve_a: AssetBalanceOf<T>,
		reserve_b: AssetBalanceOf<T>,
	) -> Result<AssetBalanceOf<T>, Error<T>> {
		ensure!(!amount_a.is_zero(), Error::<T>::ZeroAmount);
		ensure!(!reserve_a.is_zero() && !reserve_b.is_zero(), Error::<T>::InsufficientLiquidity);
		let amount_b = math::quote(
			Self::balance_to_u128(amount_a)?,
			Self::balance_to_u128(reserve_a)?,
			Self::balance_to_u128(reserve_b)?,
		)?;
		Self::u128_to_balance(amount_b)
	}

	/// Shortest path from `from` to `to` through pairs holding reserves, no longer than
	/// `MaxSwapPathLength` assets. Neighbours are visited in ascending id order, so the
	/// result is deterministic.
	pub fn find_route(from: T::DexAssetId, to: T::DexAssetId) -> Option<Vec<T::DexAssetId>> {
		if from == to {
			return Some(vec![from])
		}

		let mut neighbours: BTreeMap<T::DexAssetId, Vec<T::DexAssetId>> = BTreeMap::new();
		for (pair_id, pair) in Pairs::<T>::iter() {
			let (reserve_x, reserve_y) = pair.reserves();
			if reserve_x.is_zero() || reserve_y.is_zero() {
				continue
			}
			neighbours.entry(pair_id.asset_x()).or_default().push(pair_id.asset_y());
			neighbours.entry(pair_id.asset_y()).or_default().push(pair_id.asset_x());
		}
		neighbours.values_mut().for_each(|assets| assets.sort());

		let max_len = T::MaxSwapPathLength::get() as usize;
		let mut previous: BTreeMap<T::DexAssetId, T::DexAssetId> = BTreeMap::new();
		let mut visited = BTreeSet::new();
		let mut queue = VecDeque::new();
		visited.insert(from);
		queue.push_back((from, 1usize));

		while let Some((asset, len)) = queue.pop_front() {
			if len >= max_len {
				continue
			}
			for next in neighbours.get(&asset).into_iter().flatten() {
				if !visited.insert(*next) {
					continue
				}
				previous.insert(*next, asset);
				if *next == to {
					let mut route = vec![to];
					let mut cursor = to;
					while let Some(prev) = previous.get(&cursor) {
						route.push(*prev);
						cursor = *prev;
					}
					route.reverse();
					return Some(route)
				}
				queue.push_back((*next, len + 1));
			}
		}
		None
	}

	fn validate_path(path: &[T::DexAssetId]) -> Result<(), Error<T>> {
		ensure!(
			path.len() >= 2 && path.len() <= T::MaxSwapPathLength::get() as usize,
			Error::<T>::InvalidPath
		);
		Ok(())
	}

	/// Moves `amounts[0]` from `who` into the first pair, then swaps hop by hop with every
	/// intermediate output going straight to the next pair's account.
	fn execute_swap(
		who: &T::AccountId,
		path: &[T::DexAssetId],
		amounts: &[AssetBalanceOf<T>],
		to: &T::AccountId,
	) -> DispatchResult {
		let (first, second) = match path {
			[first, second, ..] => (*first, *second),
			_ => return Err(Error::<T>::InvalidPath.into()),
		};
		let amount_in = *amounts.first().ok_or(Error::<T>::InvalidPath)?;
		let first_pair = AssetIdPair::<T>::new(first, second)?;
		T::Fungibles::transfer(
			first,
			who,
			&Self::pair_account_id(&first_pair),
			amount_in,
			Preservation::Expendable,
		)?;

		for (i, hop) in path.windows(2).enumerate() {
			let pair_id = AssetIdPair::<T>::new(hop[0], hop[1])?;
			let amount_out = amounts.get(i + 1).copied().ok_or(Error::<T>::InvalidPath)?;
			let (amount_x_out, amount_y_out) = if pair_id.is_x(hop[0]) {
				(Zero::zero(), amount_out)
			} else {
				(amount_out, Zero::zero())
			};
			let recipient = match path.get(i + 2) {
				Some(next) => Self::pair_account_id(&AssetIdPair::<T>::new(hop[1], *next)?),
				None => to.clone(),
			};
			Self::do_swap(&pair_id, amount_x_out, amount_y_out, &recipient)?;
		}

		Self::deposit_event(Event::SwapExecuted {
			who: who.clone(),
			to: to.clone(),
			path: path.to_vec(),
			amounts: amounts.to_vec(),
		});
		Ok(())
	}

	/// Swaps a couple of values between canonical order and the order starting with `first`.
	fn orient<V>(pair_id: &AssetIdPair<T>, first: T::DexAssetId, x: V, y: V) -> (V, V) {
		if pair_id.is_x(first) {
			(x, y)
		} else {
			(y, x)
		}
	}
}
