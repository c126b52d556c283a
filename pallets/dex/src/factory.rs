//! Pair registry: pair creation, pair accounts and LP-share id allocation.

use codec::Decode;
use frame_support::ensure;
use frame_support::traits::fungibles::{Create, Inspect};
use sp_runtime::traits::{CheckedAdd, Hash, One, TrailingZeroInput, Zero};
use sp_runtime::DispatchError;

use crate::*;

impl<T: Config> Pallet<T> {
	/// Registers the pair of `asset_x_id` and `asset_y_id` and creates its LP-share asset,
	/// owned by the pair account.
	///
	/// # Arguments
	///
	/// * `creator` - The account requesting the pair, reported in the event.
	/// * `asset_x_id` - Identifier for one asset of the pair.
	/// * `asset_y_id` - Identifier for the other asset of the pair.
	///
	/// # Errors
	///
	/// * `IdenticalAssets` - if both ids are equal.
	/// * `PairAlreadyExists` - if the pair is registered in either order.
	/// * `AssetNotFound` - if either asset is not registered.
	pub fn do_create_pair(
		creator: &T::AccountId,
		asset_x_id: T::DexAssetId,
		asset_y_id: T::DexAssetId,
	) -> Result<AssetIdPair<T>, DispatchError> {
		let pair = AssetIdPair::<T>::new(asset_x_id, asset_y_id)?;
		ensure!(!Pairs::<T>::contains_key(pair), Error::<T>::PairAlreadyExists);
		ensure!(
			Self::asset_exists(asset_x_id) && Self::asset_exists(asset_y_id),
			Error::<T>::AssetNotFound
		);

		let pair_account = Self::pair_account_id(&pair);
		let lp_token_id = Self::allocate_lp_token_id()?;
		T::Fungibles::create(lp_token_id, pair_account.clone(), true, T::LpTokenDust::get())?;

		Pairs::<T>::insert(pair, PairInfo::empty(pair, lp_token_id));
		PairCount::<T>::mutate(|count| *count = count.saturating_add(1));

		log::debug!(
			target: LOG_TARGET,
			"created pair {:?} with LP-share asset {:?}",
			pair,
			lp_token_id,
		);
		Self::deposit_event(Event::PairCreated {
			creator: creator.clone(),
			pair,
			pair_account,
			lp_token_id,
		});
		Ok(pair)
	}

	/// The registry record for two assets, in either order.
	pub fn get_pair(asset_x_id: T::DexAssetId, asset_y_id: T::DexAssetId) -> Option<PairInfo<T>> {
		AssetIdPair::<T>::new(asset_x_id, asset_y_id).ok().and_then(|pair| Pairs::<T>::get(pair))
	}

	/// The keyless account holding the reserves of `pair`.
	///
	/// Derived from a hash of the pair so that distinct pairs never share an account, even
	/// with short account ids.
	pub fn pair_account_id(pair: &AssetIdPair<T>) -> T::AccountId {
		let entropy = <T as frame_system::Config>::Hashing::hash_of(&(PALLET_ID, pair));
		Decode::decode(&mut TrailingZeroInput::new(entropy.as_ref()))
			.expect("infinite length input; no invalid inputs for type; qed")
	}

	/// Whether the asset is registered: registered assets always have a positive
	/// minimum balance.
	pub(crate) fn asset_exists(asset_id: T::DexAssetId) -> bool {
		!T::Fungibles::minimum_balance(asset_id).is_zero()
	}

	/// Next unregistered id from `NextLpTokenId`. Ids already taken in the shared asset
	/// registry are skipped.
	fn allocate_lp_token_id() -> Result<T::DexAssetId, Error<T>> {
		let mut lp_token_id = NextLpTokenId::<T>::get().unwrap_or_else(T::FirstLpTokenId::get);
		while Self::asset_exists(lp_token_id) {
			lp_token_id =
				lp_token_id.checked_add(&One::one()).ok_or(Error::<T>::LpTokenIdExhausted)?;
		}
		let next = lp_token_id.checked_add(&One::one()).ok_or(Error::<T>::LpTokenIdExhausted)?;
		NextLpTokenId::<T>::put(next);
		Ok(lp_token_id)
	}
}
