//! Constant-product exchange: pairs, a permissionless pair factory and a router.
//!
//! Every pair is identified by an unordered couple of assets and owns a keyless account
//! holding its reserves. LP shares are ordinary assets of the same `Fungibles` registry,
//! so an LP share may itself be one side of another pair.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate core;

use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::traits::fungibles;
use frame_support::{ensure, Blake2_128Concat, DebugNoBound, PalletId};
use scale_info::TypeInfo;
use sp_runtime::traits::Zero;

pub use pallet::*;

pub mod math;

mod factory;
mod pair;
mod router;

#[cfg(test)]
mod mock;


/// Log target used by this pallet.
pub const LOG_TARGET: &str = "runtime::dex";

/// The hasher used by the pallet's storage
pub type Hasher = Blake2_128Concat;

/// Alias for the asset balance type
pub type AssetBalanceOf<T> = <<T as Config>::Fungibles as fungibles::Inspect<
	<T as frame_system::Config>::AccountId,
>>::Balance;

/// Represents an amount of a specific asset in the DEX.
///
/// Each instance of `AssetAmount` includes the asset identifier (`asset_id`)
/// and the balance of that asset (`balance`).
#[derive(Clone, PartialEq, Eq, DebugNoBound, TypeInfo, Encode, Decode, MaxEncodedLen)]
#[scale_info(skip_type_params(T))]
pub struct AssetAmount<T: Config> {
	asset_id: T::DexAssetId,
	balance: AssetBalanceOf<T>,
}

impl<T: Config> Copy for AssetAmount<T> {}

impl<T: Config> AssetAmount<T> {
	/// Creates a new `AssetAmount` instance.
	///
	/// # Arguments
	///
	/// * `asset_id` - A unique identifier for the asset.
	/// * `balance` - The balance of the asset.
	pub fn new(asset_id: T::DexAssetId, balance: AssetBalanceOf<T>) -> Self {
		Self { asset_id, balance }
	}
}

/// The canonical identity of a pair: an unordered couple of distinct assets, stored
/// lowest id first.
///
/// Any asset is accepted, including the LP share of another pair.
#[derive(Clone, PartialEq, Eq, DebugNoBound, TypeInfo, Encode, Decode, MaxEncodedLen)]
#[scale_info(skip_type_params(T))]
pub struct AssetIdPair<T: Config> {
	asset_x_id: T::DexAssetId,
	asset_y_id: T::DexAssetId,
}

impl<T: Config> Copy for AssetIdPair<T> {}

impl<T: Config> AssetIdPair<T> {
	/// Creates a new `AssetIdPair`, ordering the two identifiers.
	///
	/// # Arguments
	///
	/// * `asset_x_id` - Identifier for the first asset.
	/// * `asset_y_id` - Identifier for the second asset.
	///
	/// # Errors
	///
	/// Returns `Error::<T>::IdenticalAssets` if the asset identifiers are the same.
	pub fn new(asset_x_id: T::DexAssetId, asset_y_id: T::DexAssetId) -> Result<Self, Error<T>> {
		ensure!(asset_x_id != asset_y_id, Error::<T>::IdenticalAssets);
		Ok(Self { asset_x_id: asset_x_id.min(asset_y_id), asset_y_id: asset_x_id.max(asset_y_id) })
	}

	/// The lower of the two asset ids.
	pub fn asset_x(&self) -> T::DexAssetId {
		self.asset_x_id
	}

	/// The higher of the two asset ids.
	pub fn asset_y(&self) -> T::DexAssetId {
		self.asset_y_id
	}

	/// Whether `asset_id` is the lower side of the pair.
	pub fn is_x(&self, asset_id: T::DexAssetId) -> bool {
		self.asset_x_id == asset_id
	}
}

/// Represents a pair of asset amounts, in canonical pair order.
///
/// Used for pair reserves and for reporting what went in or out of a pair.
#[derive(Clone, PartialEq, Eq, DebugNoBound, TypeInfo, Encode, Decode, MaxEncodedLen)]
#[scale_info(skip_type_params(T))]
pub struct AssetAmountPair<T: Config> {
	amount_x: AssetAmount<T>,
	amount_y: AssetAmount<T>,
}

impl<T: Config> Copy for AssetAmountPair<T> {}

impl<T: Config> AssetAmountPair<T> {
	/// Creates an `AssetAmountPair` with zero balances.
	///
	/// # Arguments
	///
	/// * `asset_id_pair` - Pair of asset identifiers.
	pub fn empty(asset_id_pair: AssetIdPair<T>) -> Self {
		Self::new(asset_id_pair, Zero::zero(), Zero::zero())
	}

	/// Creates a new `AssetAmountPair` with specified amounts.
	///
	/// # Arguments
	///
	/// * `asset_id_pair` - Pair of asset identifiers.
	/// * `amount_x` - Amount for the first asset.
	/// * `amount_y` - Amount for the second asset.
	pub fn new(
		asset_id_pair: AssetIdPair<T>,
		amount_x: AssetBalanceOf<T>,
		amount_y: AssetBalanceOf<T>,
	) -> Self {
		Self {
			amount_x: AssetAmount { asset_id: asset_id_pair.asset_x_id, balance: amount_x },
			amount_y: AssetAmount { asset_id: asset_id_pair.asset_y_id, balance: amount_y },
		}
	}
}

/// The registry record of a pair.
///
/// `reserves` is the pair's recorded view of what its account holds. Anything the account
/// holds above it is input that has not been accounted for yet.
#[derive(Clone, PartialEq, Eq, DebugNoBound, TypeInfo, Encode, Decode, MaxEncodedLen)]
#[scale_info(skip_type_params(T))]
pub struct PairInfo<T: Config> {
	reserves: AssetAmountPair<T>,
	lp_token_id: T::DexAssetId,
	/// Reserves after the last mint or burn while a protocol fee recipient was set.
	k_last: Option<(AssetBalanceOf<T>, AssetBalanceOf<T>)>,
}

impl<T: Config> PairInfo<T> {
	/// Creates an empty pair record for the given pair and LP-share asset.
	///
	/// # Arguments
	///
	/// * `pair` - Pair of asset identifiers for the pair.
	/// * `lp_token_id` - Identifier of the LP-share asset issued by the pair.
	fn empty(pair: AssetIdPair<T>, lp_token_id: T::DexAssetId) -> Self {
		Self { reserves: AssetAmountPair::empty(pair), lp_token_id, k_last: None }
	}

	pub fn lp_token_id(&self) -> T::DexAssetId {
		self.lp_token_id
	}

	/// Reserves in canonical order.
	pub fn reserves(&self) -> (AssetBalanceOf<T>, AssetBalanceOf<T>) {
		(self.reserves.amount_x.balance, self.reserves.amount_y.balance)
	}

	pub fn k_last(&self) -> Option<(AssetBalanceOf<T>, AssetBalanceOf<T>)> {
		self.k_last
	}
}

const PALLET_ID: PalletId = PalletId(*b"__Dex__!");

#[frame_support::pallet]
pub mod pallet {
	use core::fmt::Debug;

	use codec::EncodeLike;
	use frame_support::pallet_prelude::*;
	use frame_support::traits::fungibles::{Create, Inspect, Mutate};
	use frame_system::pallet_prelude::*;
	use sp_runtime::traits::{CheckedAdd, One};
	use sp_runtime::ArithmeticError;
	use sp_std::vec::Vec;

	use crate::*;

	#[pallet::pallet]
	pub struct Pallet<T>(_);

	/// Configure the pallet by specifying the parameters and types on which it depends.
	#[pallet::config]
	pub trait Config: frame_system::Config {
		/// Because this pallet emits events, it depends on the runtime's definition of an event.
		type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

		/// The asset registry. Pair reserves and LP shares both live here.
		type Fungibles: Inspect<Self::AccountId, AssetId = Self::DexAssetId>
			+ Mutate<Self::AccountId>
			+ Create<Self::AccountId>;

		/// Type to use for asset IDs, needs to implement `Ord` to canonicalize pair ids and
		/// `CheckedAdd + One` to allocate LP-share ids.
		type DexAssetId: Ord
			+ Clone
			+ Copy
			+ PartialEq
			+ TypeInfo
			+ Encode
			+ EncodeLike
			+ Decode
			+ MaxEncodedLen
			+ Debug
			+ CheckedAdd
			+ One;

		/// The minimum balance for LP tokens
		type LpTokenDust: Get<AssetBalanceOf<Self>>;

		/// The swap fee in tenths of a percent, retained by the pair.
		#[pallet::constant]
		type LpFee: Get<u32>;

		/// The id given to the LP-share asset of the first pair created.
		type FirstLpTokenId: Get<Self::DexAssetId>;

		/// The maximum number of assets in a swap path.
		#[pallet::constant]
		type MaxSwapPathLength: Get<u32>;

		/// The account allowed to set the protocol fee recipient until it hands the role over.
		type InitialFeeToSetter: Get<Self::AccountId>;
	}

	/// Registry of pairs, keyed by the canonical asset couple. Entries are never removed.
	#[pallet::storage]
	pub type Pairs<T: Config> = StorageMap<_, Hasher, AssetIdPair<T>, PairInfo<T>>;

	/// Number of registered pairs.
	#[pallet::storage]
	pub type PairCount<T> = StorageValue<_, u32, ValueQuery>;

	/// The LP-share asset id the next pair will receive.
	#[pallet::storage]
	pub type NextLpTokenId<T: Config> = StorageValue<_, T::DexAssetId>;

	/// Recipient of protocol-fee LP shares. No protocol fee accrues while unset.
	#[pallet::storage]
	pub type FeeTo<T: Config> = StorageValue<_, T::AccountId>;

	#[pallet::type_value]
	pub fn DefaultFeeToSetter<T: Config>() -> T::AccountId {
		T::InitialFeeToSetter::get()
	}

	/// The account allowed to change `FeeTo`.
	#[pallet::storage]
	pub type FeeToSetter<T: Config> =
		StorageValue<_, T::AccountId, ValueQuery, DefaultFeeToSetter<T>>;

	#[pallet::event]
	#[pallet::generate_deposit(pub (crate) fn deposit_event)]
	pub enum Event<T: Config> {
		/// A pair and its LP-share asset were created.
		PairCreated {
			creator: T::AccountId,
			pair: AssetIdPair<T>,
			pair_account: T::AccountId,
			lp_token_id: T::DexAssetId,
		},

		/// LP shares were issued against newly deposited reserves.
		Minted {
			pair: AssetIdPair<T>,
			to: T::AccountId,
			deposited: AssetAmountPair<T>,
			liquidity: AssetBalanceOf<T>,
		},

		/// LP shares were redeemed for reserves.
		Burned {
			pair: AssetIdPair<T>,
			to: T::AccountId,
			withdrawn: AssetAmountPair<T>,
			liquidity: AssetBalanceOf<T>,
		},

		/// A pair swapped observed input for the requested output.
		Swapped {
			pair: AssetIdPair<T>,
			to: T::AccountId,
			amount_in: AssetAmountPair<T>,
			amount_out: AssetAmountPair<T>,
		},

		/// Balances held above the reserves were sent to `to`.
		Skimmed { pair: AssetIdPair<T>, to: T::AccountId, amounts: AssetAmountPair<T> },

		/// Reserves were forced to match the pair account's balances.
		Synced { pair: AssetIdPair<T>, reserves: AssetAmountPair<T> },

		/// The protocol fee recipient changed.
		FeeToSet { fee_to: Option<T::AccountId> },

		/// The account allowed to change the protocol fee recipient changed.
		FeeToSetterSet { setter: T::AccountId },

		/// Liquidity provided through the router.
		LiquidityAdded {
			who: T::AccountId,
			to: T::AccountId,
			provided: AssetAmountPair<T>,
			liquidity: AssetBalanceOf<T>,
		},

		/// Liquidity removed through the router.
		LiquidityRemoved {
			who: T::AccountId,
			to: T::AccountId,
			removed: AssetAmountPair<T>,
			liquidity: AssetBalanceOf<T>,
		},

		/// A routed swap completed. `amounts[i]` is the amount of `path[i]` moved.
		SwapExecuted {
			who: T::AccountId,
			to: T::AccountId,
			path: Vec<T::DexAssetId>,
			amounts: Vec<AssetBalanceOf<T>>,
		},
	}

	// Errors inform users that something went wrong.
	#[pallet::error]
	pub enum Error<T> {
		/// An arithmetic error has occurred
		Arithmetic,

		/// Both sides of a pair are the same asset
		IdenticalAssets,

		/// The asset is not registered
		AssetNotFound,

		/// Pair does not exist
		PairNotFound,

		/// Pair already exists
		PairAlreadyExists,

		/// No LP-share asset id is left to allocate
		LpTokenIdExhausted,

		/// The deposit is worth zero LP shares
		InsufficientLiquidityMinted,

		/// The redemption is worth zero of at least one reserve
		InsufficientLiquidityBurned,

		/// No input was supplied to a swap
		InsufficientInputAmount,

		/// No output was requested from a swap
		InsufficientOutputAmount,

		/// The pair cannot cover the requested amount
		InsufficientLiquidity,

		/// The swap would decrease the fee-adjusted reserve product
		InvariantViolation,

		/// A reserve would exceed the 112-bit ceiling
		ReserveOverflow,

		/// Amount must be positive
		ZeroAmount,

		/// The result is worse than the caller's bound
		SlippageExceeded,

		/// The operation executed after its deadline
		DeadlineExpired,

		/// The swap path is too short or too long
		InvalidPath,

		/// The caller may not perform this operation
		Unauthorized,
	}

	impl<T: Config> From<ArithmeticError> for Error<T> {
		fn from(_: ArithmeticError) -> Self {
			Self::Arithmetic
		}
	}

	#[pallet::hooks]
	impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
		fn integrity_test() {
			assert!(
				T::MaxSwapPathLength::get() > 1,
				"the `MaxSwapPathLength` should be greater than 1",
			);
			assert!(
				T::LpFee::get() < math::FEE_DENOMINATOR,
				"the `LpFee` should be below the fee denominator",
			);
		}
	}

	// Dispatchable functions allows users to interact with the pallet and invoke state changes.
	// Every dispatchable runs in its own storage layer: an error discards all of its effects.
	#[pallet::call]
	impl<T: Config> Pallet<T> {
		/// Register a pair for two assets and create its LP-share asset.
		///
		/// # Errors
		///
		/// Returns `PairAlreadyExists` if the pair, in either order, is registered.
		/// Returns `IdenticalAssets` or `AssetNotFound` for an invalid couple.
		#[pallet::call_index(0)]
		#[pallet::weight(Weight::default())]
		pub fn create_pair(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::do_create_pair(&who, asset_x_id, asset_y_id)?;
			Ok(())
		}

		/// Issue LP shares for whatever was deposited into the pair account since the last
		/// reserve update.
		#[pallet::call_index(1)]
		#[pallet::weight(Weight::default())]
		pub fn mint(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
			to: T::AccountId,
		) -> DispatchResult {
			let _ = ensure_signed(origin)?;
			let pair = AssetIdPair::new(asset_x_id, asset_y_id)?;
			Self::do_mint(&pair, &to)?;
			Ok(())
		}

		/// Redeem the LP shares held by the pair account itself, paying both reserves to `to`.
		#[pallet::call_index(2)]
		#[pallet::weight(Weight::default())]
		pub fn burn(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
			to: T::AccountId,
		) -> DispatchResult {
			let _ = ensure_signed(origin)?;
			let pair = AssetIdPair::new(asset_x_id, asset_y_id)?;
			Self::do_burn(&pair, &to)?;
			Ok(())
		}

		/// Pay out the requested amounts and accept the input already deposited, as long as
		/// the fee-adjusted reserve product does not decrease. Amounts follow the caller's
		/// asset order.
		///
		/// # Errors
		///
		/// Returns `InvariantViolation` when the deposited input does not pay for the output.
		#[pallet::call_index(3)]
		#[pallet::weight(Weight::default())]
		pub fn swap(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
			amount_x_out: AssetBalanceOf<T>,
			amount_y_out: AssetBalanceOf<T>,
			to: T::AccountId,
		) -> DispatchResult {
			let _ = ensure_signed(origin)?;
			let pair = AssetIdPair::new(asset_x_id, asset_y_id)?;
			let (amount_x_out, amount_y_out) = if pair.is_x(asset_x_id) {
				(amount_x_out, amount_y_out)
			} else {
				(amount_y_out, amount_x_out)
			};
			Self::do_swap(&pair, amount_x_out, amount_y_out, &to)
		}

		/// Send any balance held above the reserves to `to`.
		#[pallet::call_index(4)]
		#[pallet::weight(Weight::default())]
		pub fn skim(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
			to: T::AccountId,
		) -> DispatchResult {
			let _ = ensure_signed(origin)?;
			let pair = AssetIdPair::new(asset_x_id, asset_y_id)?;
			Self::do_skim(&pair, &to)
		}

		/// Force the reserves to match the pair account's balances.
		#[pallet::call_index(5)]
		#[pallet::weight(Weight::default())]
		pub fn sync(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
		) -> DispatchResult {
			let _ = ensure_signed(origin)?;
			let pair = AssetIdPair::new(asset_x_id, asset_y_id)?;
			Self::do_sync(&pair)
		}

		/// Set or clear the protocol fee recipient.
		///
		/// # Errors
		///
		/// Returns `Unauthorized` unless signed by the current fee-to setter.
		#[pallet::call_index(6)]
		#[pallet::weight(Weight::default())]
		pub fn set_fee_to(origin: OriginFor<T>, fee_to: Option<T::AccountId>) -> DispatchResult {
			let who = ensure_signed(origin)?;
			ensure!(who == FeeToSetter::<T>::get(), Error::<T>::Unauthorized);

			FeeTo::<T>::set(fee_to.clone());
			Self::deposit_event(Event::FeeToSet { fee_to });
			Ok(())
		}

		/// Hand the fee-to setter role to another account.
		#[pallet::call_index(7)]
		#[pallet::weight(Weight::default())]
		pub fn set_fee_to_setter(origin: OriginFor<T>, setter: T::AccountId) -> DispatchResult {
			let who = ensure_signed(origin)?;
			ensure!(who == FeeToSetter::<T>::get(), Error::<T>::Unauthorized);

			FeeToSetter::<T>::put(setter.clone());
			Self::deposit_event(Event::FeeToSetterSet { setter });
			Ok(())
		}

		/// Provide liquidity to a pair, creating it first if needed, and mint LP shares to
		/// `to`. Once the pair holds reserves only the amounts matching the current ratio are
		/// taken.
		///
		/// # Errors
		///
		/// Returns `SlippageExceeded` if an amount taken is below its minimum.
		/// Returns `DeadlineExpired` if the current block is past `deadline`.
		#[pallet::call_index(8)]
		#[pallet::weight(Weight::default())]
		pub fn add_liquidity(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
			amount_x_desired: AssetBalanceOf<T>,
			amount_y_desired: AssetBalanceOf<T>,
			amount_x_min: AssetBalanceOf<T>,
			amount_y_min: AssetBalanceOf<T>,
			to: T::AccountId,
			deadline: BlockNumberFor<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::ensure_deadline(deadline)?;
			Self::do_add_liquidity(
				&who,
				asset_x_id,
				asset_y_id,
				amount_x_desired,
				amount_y_desired,
				amount_x_min,
				amount_y_min,
				&to,
			)?;
			Ok(())
		}

		/// Return `liquidity` LP shares to their pair and receive both reserves pro rata.
		///
		/// # Errors
		///
		/// Returns `SlippageExceeded` if an amount received is below its minimum.
		/// Returns `DeadlineExpired` if the current block is past `deadline`.
		#[pallet::call_index(9)]
		#[pallet::weight(Weight::default())]
		pub fn remove_liquidity(
			origin: OriginFor<T>,
			asset_x_id: T::DexAssetId,
			asset_y_id: T::DexAssetId,
			liquidity: AssetBalanceOf<T>,
			amount_x_min: AssetBalanceOf<T>,
			amount_y_min: AssetBalanceOf<T>,
			to: T::AccountId,
			deadline: BlockNumberFor<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::ensure_deadline(deadline)?;
			Self::do_remove_liquidity(
				&who,
				asset_x_id,
				asset_y_id,
				liquidity,
				amount_x_min,
				amount_y_min,
				&to,
			)?;
			Ok(())
		}

		/// Swap exactly `amount_in` of `path[0]` along `path`, sending the last asset to `to`.
		///
		/// # Errors
		///
		/// Returns `SlippageExceeded` if the final output is below `amount_out_min`.
		/// Any failing hop discards the whole swap.
		#[pallet::call_index(10)]
		#[pallet::weight(Weight::default())]
		pub fn swap_exact_tokens_for_tokens(
			origin: OriginFor<T>,
			amount_in: AssetBalanceOf<T>,
			amount_out_min: AssetBalanceOf<T>,
			path: BoundedVec<T::DexAssetId, T::MaxSwapPathLength>,
			to: T::AccountId,
			deadline: BlockNumberFor<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::ensure_deadline(deadline)?;
			Self::do_swap_exact_tokens_for_tokens(&who, &path, amount_in, amount_out_min, &to)?;
			Ok(())
		}

		/// Swap as little of `path[0]` as needed to receive exactly `amount_out` of the last
		/// asset of `path`.
		///
		/// # Errors
		///
		/// Returns `SlippageExceeded` if the required input is above `amount_in_max`.
		#[pallet::call_index(11)]
		#[pallet::weight(Weight::default())]
		pub fn swap_tokens_for_exact_tokens(
			origin: OriginFor<T>,
			amount_out: AssetBalanceOf<T>,
			amount_in_max: AssetBalanceOf<T>,
			path: BoundedVec<T::DexAssetId, T::MaxSwapPathLength>,
			to: T::AccountId,
			deadline: BlockNumberFor<T>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			Self::ensure_deadline(deadline)?;
			Self::do_swap_tokens_for_exact_tokens(&who, &path, amount_out, amount_in_max, &to)?;
			Ok(())
		}
	}

	impl<T: Config> Pallet<T> {
		pub(crate) fn balance_to_u128(value: AssetBalanceOf<T>) -> Result<u128, Error<T>> {
			TryInto::<u128>::try_into(value).map_err(|_| Error::<T>::Arithmetic)
		}

		pub(crate) fn u128_to_balance(value: u128) -> Result<AssetBalanceOf<T>, Error<T>> {
			<AssetBalanceOf<T> as TryFrom<u128>>::try_from(value)
				.map_err(|_| Error::<T>::Arithmetic)
		}
	}
}
