//! Protocol-fee converter.
//!
//! Holds the LP shares the dex mints as protocol fee, redeems them on request and swaps the
//! redeemed assets into a single target asset, which it forwards to a beneficiary. Swaps
//! take whatever the current reserves of the traversed pairs give.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
mod mock;


/// Log target used by this pallet.
pub const LOG_TARGET: &str = "runtime::fee-converter";

#[frame_support::pallet]
pub mod pallet {
	use frame_support::pallet_prelude::*;
	use frame_support::traits::fungibles::{Inspect, Mutate};
	use frame_support::traits::tokens::Preservation;
	use frame_support::PalletId;
	use frame_system::pallet_prelude::*;
	use pallet_dex::{AssetBalanceOf, AssetIdPair};
	use sp_runtime::traits::{AccountIdConversion, Zero};

	use crate::LOG_TARGET;

	#[pallet::pallet]
	pub struct Pallet<T>(_);

	#[pallet::config]
	pub trait Config: frame_system::Config + pallet_dex::Config {
		/// Because this pallet emits events, it depends on the runtime's definition of an event.
		type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

		/// Derives the account holding the shares to convert.
		#[pallet::constant]
		type PalletId: Get<PalletId>;

		/// Origin allowed to set the beneficiary and the target asset.
		type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

		/// The maximum number of pairs converted by one `convert_multiple`.
		#[pallet::constant]
		type MaxConvertBatch: Get<u32>;
	}

	/// Receives the converted target asset.
	#[pallet::storage]
	pub type Beneficiary<T: Config> = StorageValue<_, T::AccountId>;

	/// The asset everything is converted into.
	#[pallet::storage]
	pub type TargetAsset<T: Config> = StorageValue<_, T::DexAssetId>;

	#[pallet::event]
	#[pallet::generate_deposit(pub (crate) fn deposit_event)]
	pub enum Event<T: Config> {
		/// The shares held for `pair` were redeemed and `amount_out` of the target asset sent
		/// to the beneficiary.
		Converted {
			caller: T::AccountId,
			pair: AssetIdPair<T>,
			shares: AssetBalanceOf<T>,
			amount_out: AssetBalanceOf<T>,
			beneficiary: T::AccountId,
		},
		BeneficiarySet { beneficiary: T::AccountId },
		TargetAssetSet { asset: T::DexAssetId },
	}

	#[pallet::error]
	pub enum Error<T> {
		/// Beneficiary or target asset is not set
		NotConfigured,
		/// The converter holds no LP shares of the pair
		NoSharesHeld,
		/// No pair path leads from a redeemed asset to the target asset
		NoRouteToTarget,
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		#[pallet::call_index(0)]
		#[pallet::weight(Weight::default())]
		pub fn set_beneficiary(origin: OriginFor<T>, beneficiary: T::AccountId) -> DispatchResult {
			T::AdminOrigin::ensure_origin(origin)?;
			Beneficiary::<T>::put(beneficiary.clone());
			Self::deposit_event(Event::BeneficiarySet { beneficiary });
			Ok(())
		}

		#[pallet::call_index(1)]
		#[pallet::weight(Weight::default())]
		pub fn set_target_asset(origin: OriginFor<T>, asset: T::DexAssetId) -> DispatchResult {
			T::AdminOrigin::ensure_origin(origin)?;
			TargetAsset::<T>::put(asset);
			Self::deposit_event(Event::TargetAssetSet { asset });
			Ok(())
		}

		/// Redeem every LP share the converter holds for the pair of `asset_a` and `asset_b`,
		/// swap the proceeds into the target asset and forward it to the beneficiary.
		///
		/// Anyone may call this.
		///
		/// # Errors
		///
		/// Returns `NotConfigured`, `NoSharesHeld` or `NoRouteToTarget`, or any dex error of
		/// the burn and the swaps. A failure discards every effect of the call.
		#[pallet::call_index(2)]
		#[pallet::weight(Weight::default())]
		pub fn convert(
			origin: OriginFor<T>,
			asset_a: T::DexAssetId,
			asset_b: T::DexAssetId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_convert(&who, asset_a, asset_b)?;
			Ok(())
		}

		/// Convert several pairs in order. Fails as a whole if any conversion fails.
		#[pallet::call_index(3)]
		#[pallet::weight(Weight::default())]
		pub fn convert_multiple(
			origin: OriginFor<T>,
			pairs: BoundedVec<(T::DexAssetId, T::DexAssetId), T::MaxConvertBatch>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			for (asset_a, asset_b) in pairs {
				Self::do_convert(&who, asset_a, asset_b)?;
			}
			Ok(())
		}
	}

	impl<T: Config> Pallet<T> {
		/// The account holding the shares to convert.
		pub fn account_id() -> T::AccountId {
			T::PalletId::get().into_account_truncating()
		}

		pub fn do_convert(
			caller: &T::AccountId,
			asset_a: T::DexAssetId,
			asset_b: T::DexAssetId,
		) -> Result<AssetBalanceOf<T>, DispatchError> {
			let beneficiary = Beneficiary::<T>::get().ok_or(Error::<T>::NotConfigured)?;
			let target = TargetAsset::<T>::get().ok_or(Error::<T>::NotConfigured)?;

			let pair_id = AssetIdPair::<T>::new(asset_a, asset_b)?;
			let pair = pallet_dex::Pairs::<T>::get(pair_id)
				.ok_or(pallet_dex::Error::<T>::PairNotFound)?;
			let account = Self::account_id();
			let shares = T::Fungibles::balance(pair.lp_token_id(), &account);
			ensure!(!shares.is_zero(), Error::<T>::NoSharesHeld);

			T::Fungibles::transfer(
				pair.lp_token_id(),
				&account,
				&pallet_dex::Pallet::<T>::pair_account_id(&pair_id),
				shares,
				Preservation::Expendable,
			)?;
			pallet_dex::Pallet::<T>::do_burn(&pair_id, &account)?;

			for asset in [pair_id.asset_x(), pair_id.asset_y()] {
				Self::swap_holding_into(asset, target, &account)?;
			}

			let amount_out = T::Fungibles::balance(target, &account);
			if !amount_out.is_zero() {
				T::Fungibles::transfer(
					target,
					&account,
					&beneficiary,
					amount_out,
					Preservation::Expendable,
				)?;
			}

			log::debug!(
				target: LOG_TARGET,
				"converted {:?} shares of {:?} into {:?} of the target asset",
				shares,
				pair_id,
				amount_out,
			);
			Self::deposit_event(Event::Converted {
				caller: caller.clone(),
				pair: pair_id,
				shares,
				amount_out,
				beneficiary,
			});
			Ok(amount_out)
		}

		/// Swaps the converter's whole balance of `asset` into `target` along the shortest
		/// route, accepting any output.
		fn swap_holding_into(
			asset: T::DexAssetId,
			target: T::DexAssetId,
			account: &T::AccountId,
		) -> DispatchResult {
			if asset == target {
				return Ok(())
			}
			let amount = T::Fungibles::balance(asset, account);
			if amount.is_zero() {
				return Ok(())
			}

			let route = pallet_dex::Pallet::<T>::find_route(asset, target)
				.ok_or(Error::<T>::NoRouteToTarget)?;
			let amounts = pallet_dex::Pallet::<T>::do_swap_exact_tokens_for_tokens(
				account,
				&route,
				amount,
				Zero::zero(),
				account,
			)?;
			log::trace!(target: LOG_TARGET, "swapped along {:?}: {:?}", route, amounts);
			Ok(())
		}
	}
}
