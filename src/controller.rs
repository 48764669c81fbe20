use crate::error::{SubmitError, TickerError};
use crate::optimizer::Optimizer;
use crate::render::{DisplayBlock, Renderer};
use crate::ticker::{sanitize_ticker_input, TickerListView, TickerSet};
use crate::validator::{
    capital_advisory, parse_number, percent_to_fraction, return_advisory, OptimizationRequest,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const SUBMIT_LABEL: &str = "Optimize Portfolio";
pub const SUBMITTING_LABEL: &str = "Optimizing...";

/// Where the form is in its submit cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    ResultsShown(Vec<DisplayBlock>),
    ErrorShown(String),
}

/// Affordance of the submit control, published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiState {
    pub loading: bool,
}

impl UiState {
    pub fn button_label(&self) -> &'static str {
        if self.loading {
            SUBMITTING_LABEL
        } else {
            SUBMIT_LABEL
        }
    }

    pub fn submit_enabled(&self) -> bool {
        !self.loading
    }
}

/// Owns the ticker set, the raw form fields and the submit cycle for one
/// session. Fields are only reachable through the methods below.
pub struct FormController {
    tickers: TickerSet,
    ticker_view: TickerListView,
    ticker_input: String,
    ticker_error: Option<TickerError>,
    capital: String,
    desired_return: String,
    horizon: String,
    phase: Phase,
    renderer: Renderer,
    ui_state: watch::Sender<UiState>,
}

impl Default for FormController {
    fn default() -> Self {
        Self::new(Renderer::default())
    }
}

impl FormController {
    pub fn new(renderer: Renderer) -> FormController {
        let (ui_state, _) = watch::channel(UiState { loading: false });
        let tickers = TickerSet::new();
        FormController {
            ticker_view: tickers.view(),
            tickers,
            ticker_input: String::new(),
            ticker_error: None,
            capital: String::new(),
            desired_return: String::new(),
            horizon: String::new(),
            phase: Phase::Idle,
            renderer,
            ui_state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.ui_state.subscribe()
    }

    pub fn ui_state(&self) -> UiState {
        *self.ui_state.borrow()
    }

    fn set_loading(&self, loading: bool) {
        self.ui_state.send_replace(UiState { loading });
    }

    // Tickers

    pub fn tickers(&self) -> &TickerSet {
        &self.tickers
    }

    pub fn ticker_view(&self) -> &TickerListView {
        &self.ticker_view
    }

    pub fn ticker_input(&self) -> &str {
        &self.ticker_input
    }

    pub fn ticker_error(&self) -> Option<TickerError> {
        self.ticker_error
    }

    /// Replace the ticker input, filtered the way keystrokes are.
    pub fn set_ticker_input(&mut self, raw: &str) {
        self.ticker_input = sanitize_ticker_input(raw);
    }

    pub fn push_ticker_char(&mut self, c: char) {
        self.ticker_input.push_str(&sanitize_ticker_input(&c.to_string()));
    }

    pub fn pop_ticker_char(&mut self) {
        self.ticker_input.pop();
    }

    /// Add whatever is in the ticker input.
    pub fn add_ticker_from_input(&mut self) -> Result<(), TickerError> {
        let raw = self.ticker_input.clone();
        self.add_ticker(&raw)?;
        self.ticker_input.clear();
        Ok(())
    }

    pub fn add_ticker(&mut self, raw: &str) -> Result<(), TickerError> {
        match self.tickers.add(raw) {
            Ok(symbol) => {
                debug!(symbol = %symbol, "ticker added");
                self.ticker_error = None;
                self.ticker_view = self.tickers.view();
                Ok(())
            }
            Err(e) => {
                debug!(input = raw, error = %e, "ticker rejected");
                self.ticker_error = Some(e);
                Err(e)
            }
        }
    }

    pub fn remove_ticker(&mut self, symbol: &str) {
        if self.tickers.remove(symbol) {
            debug!(symbol, "ticker removed");
            self.ticker_view = self.tickers.view();
        }
    }

    // Raw fields

    pub fn capital(&self) -> &str {
        &self.capital
    }

    pub fn set_capital(&mut self, text: &str) {
        self.capital = text.to_string();
    }

    pub fn desired_return(&self) -> &str {
        &self.desired_return
    }

    /// The desired return as a percent, e.g. `"7.5"` for 7.5%.
    pub fn set_desired_return(&mut self, text: &str) {
        self.desired_return = text.to_string();
    }

    pub fn horizon(&self) -> &str {
        &self.horizon
    }

    pub fn set_horizon(&mut self, horizon: &str) {
        self.horizon = horizon.to_string();
    }

    pub fn capital_advisory(&self) -> Option<&'static str> {
        capital_advisory(&self.capital)
    }

    pub fn return_advisory(&self) -> Option<&'static str> {
        return_advisory(&self.desired_return)
    }

    // Submit cycle

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    /// Start a submission. Returns the request to send, or `None` when the
    /// control is disabled or validation failed (the phase then says why).
    pub fn begin_submit(&mut self) -> Option<OptimizationRequest> {
        if self.is_submitting() {
            return None;
        }
        self.phase = Phase::Submitting;
        self.set_loading(true);

        let horizon = Some(self.horizon.as_str()).filter(|h| !h.trim().is_empty());
        match OptimizationRequest::build(
            parse_number(&self.capital),
            percent_to_fraction(&self.desired_return),
            horizon,
            &self.tickers,
        ) {
            Ok(request) => Some(request),
            Err(errors) => {
                info!(count = errors.kinds().len(), "submission blocked by validation");
                self.phase = Phase::ErrorShown(errors.to_string());
                self.set_loading(false);
                None
            }
        }
    }

    /// Finish the submission started by `begin_submit`.
    pub fn finish_submit(&mut self, outcome: Result<Value, SubmitError>) {
        self.phase = match outcome {
            Ok(value) => {
                let blocks = self.renderer.render(&value);
                info!(blocks = blocks.len(), "optimization succeeded");
                Phase::ResultsShown(blocks)
            }
            Err(e) => {
                warn!(error = %e, "optimization failed");
                Phase::ErrorShown(e.user_message().to_string())
            }
        };
        self.set_loading(false);
    }

    /// Validate, send at most one request, and show the outcome.
    pub async fn submit(&mut self, optimizer: &dyn Optimizer) -> &Phase {
        if let Some(request) = self.begin_submit() {
            info!(
                capital = request.capital(),
                desired_return = request.desired_return(),
                horizon = request.horizon(),
                tickers = request.tickers().len(),
                "submitting portfolio"
            );
            let outcome = optimizer.optimize(&request).await;
            self.finish_submit(outcome);
        }
        &self.phase
    }
}
