//! Gaussian mixture-based background/foreground segmentation.
//!
//! Wraps the native implementation of "An improved adaptive background
//! mixture model for real-time tracking with shadow detection"
//! (KaewTraKulPong and Bowden, 2001).

use std::sync::Arc;

use cvlink_ffi_common::RawHandle;
use tracing::debug;

use super::BackgroundSubtractor;
use crate::error::{Error, Result};
use crate::handle::{NativeObject, OwnedHandle};
use crate::native::CvExtern;
use crate::runtime;
use crate::tracing::prefix;

/// Tuning parameters for [`BackgroundSubtractorMog`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MogParams {
    /// Length of the history
    pub history: i32,
    /// Maximum number of Gaussian mixtures
    pub n_mixtures: i32,
    /// Background ratio
    pub background_ratio: f64,
    /// Noise strength (standard deviation of brightness or each color
    /// channel). 0 lets the native side pick a value.
    pub noise_sigma: f64,
}

impl Default for MogParams {
    fn default() -> Self {
        Self {
            history: 200,
            n_mixtures: 5,
            background_ratio: 0.7,
            noise_sigma: 0.0,
        }
    }
}

impl MogParams {
    pub fn with_history(mut self, history: i32) -> Self {
        self.history = history;
        self
    }

    pub fn with_mixtures(mut self, n_mixtures: i32) -> Self {
        self.n_mixtures = n_mixtures;
        self
    }

    pub fn with_background_ratio(mut self, ratio: f64) -> Self {
        self.background_ratio = ratio;
        self
    }

    pub fn with_noise_sigma(mut self, sigma: f64) -> Self {
        self.noise_sigma = sigma;
        self
    }
}

/// Native MOG background subtractor.
pub struct BackgroundSubtractorMog {
    api: Arc<dyn CvExtern>,
    ptr: OwnedHandle,
    subtractor: RawHandle,
    algorithm: RawHandle,
    params: MogParams,
}

impl BackgroundSubtractorMog {
    /// Create through the process-wide native runtime.
    pub fn new(params: MogParams) -> Result<Self> {
        Self::with_api(runtime::native()?, params)
    }

    /// Create through an explicit entry point surface.
    pub fn with_api(api: Arc<dyn CvExtern>, params: MogParams) -> Result<Self> {
        let handles = api.mog_create(
            params.history,
            params.n_mixtures,
            params.background_ratio,
            params.noise_sigma,
        );
        if handles.ptr.is_null() {
            return Err(Error::Construction(format!(
                "background subtractor MOG (history={}, nmixtures={}, ratio={}, sigma={})",
                params.history, params.n_mixtures, params.background_ratio, params.noise_sigma
            )));
        }
        debug!("{} Created MOG subtractor {:?}", prefix::HANDLE, handles.ptr);

        Ok(Self {
            api,
            ptr: OwnedHandle::new(handles.ptr),
            subtractor: handles.subtractor,
            algorithm: handles.algorithm,
            params,
        })
    }

    pub fn params(&self) -> &MogParams {
        &self.params
    }
}

impl NativeObject for BackgroundSubtractorMog {
    fn ptr(&self) -> RawHandle {
        self.ptr.get()
    }

    fn release(&mut self) {
        let Some(mut raw) = self.ptr.take() else {
            return;
        };
        debug!("{} Releasing MOG subtractor {:?}", prefix::HANDLE, raw);
        // SAFETY: `raw` came from `mog_create` on `self.api` and `take`
        // hands it out only once.
        unsafe { self.api.mog_release(&mut raw) };
        self.subtractor = RawHandle::NULL;
        self.algorithm = RawHandle::NULL;
    }
}

impl BackgroundSubtractor for BackgroundSubtractorMog {
    fn algorithm_ptr(&self) -> RawHandle {
        self.algorithm
    }

    fn background_subtractor_ptr(&self) -> RawHandle {
        self.subtractor
    }
}

impl Drop for BackgroundSubtractorMog {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for BackgroundSubtractorMog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSubtractorMog")
            .field("ptr", &self.ptr.get())
            .field("subtractor", &self.subtractor)
            .field("algorithm", &self.algorithm)
            .field("params", &self.params)
            .finish()
    }
}
