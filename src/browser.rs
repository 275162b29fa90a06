use chromiumoxide::{
	Page,
	browser::{Browser, BrowserConfig},
};
use color_eyre::{Result, eyre::eyre};
use futures::StreamExt;
use scraper::Html;
use tokio::task::JoinHandle;

use crate::{FieldKind, FieldRef, ensure_scheme, error::QuizError, filler::FieldValue};

/// Every element an answer can be written into, in document order.
///
/// Used both when parsing a snapshot and when locating the live element again, so the
/// document-order index in a [`FieldRef`] means the same thing on both sides.
pub const ANSWER_FIELD_SELECTOR: &str = r#"input[type="text"], input:not([type]), input[type="textarea"], textarea, select"#;

/// Snapshot of a page after rendering settled
#[derive(Clone, Debug)]
pub struct RenderedDocument {
	/// Address the snapshot was taken at
	pub address: String,
	/// Serialized `document.documentElement`
	pub html: String,
}

impl RenderedDocument {
	pub fn new(address: impl Into<String>, html: impl Into<String>) -> Self {
		Self {
			address: address.into(),
			html: html.into(),
		}
	}

	pub fn parse(&self) -> Html {
		Html::parse_document(&self.html)
	}
}

/// Something clickable, located either by selector or by its caption
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClickTarget {
	Css(&'static str),
	/// A button whose text contains the needle
	ButtonText(&'static str),
}

/// A browser tab under our control.
///
/// Rendering is asynchronous on the sites we drive, so callers wait a settle delay after
/// [`navigate`](BrowserSession::navigate) before reading [`rendered_state`](BrowserSession::rendered_state).
#[allow(async_fn_in_trait)]
pub trait BrowserSession {
	/// Loads the address, prepending `https://` when no scheme is given. Returns the address actually loaded.
	async fn navigate(&mut self, address: &str) -> Result<String>;

	async fn rendered_state(&self) -> Result<RenderedDocument>;

	/// Clears the field and writes `value` into it
	async fn write_field(&self, field: &FieldRef, value: &FieldValue) -> Result<()>;

	/// Clicks the first element matching `target`. `Ok(false)` if nothing matched.
	async fn click(&self, target: &ClickTarget) -> Result<bool>;

	/// Best-effort teardown; safe to call any number of times
	async fn close(&mut self);
}

/// Chrome driven over CDP
pub struct ChromeSession {
	browser: Option<Browser>,
	page: Option<Page>,
	handler: Option<JoinHandle<()>>,
}

impl ChromeSession {
	pub async fn launch(visible: bool) -> Result<Self> {
		let builder = BrowserConfig::builder().args(["--no-sandbox", "--disable-dev-shm-usage", "--disable-blink-features=AutomationControlled"]);
		let builder = if visible { builder.with_head() } else { builder };
		let config = builder.build().map_err(|e| eyre!("Failed to build browser config: {}", e))?;

		let (browser, mut handler) = Browser::launch(config).await.map_err(|e| eyre!("Failed to launch browser: {}", e))?;

		// Events must be drained or the browser hangs
		let handle = tokio::spawn(async move { while let Some(_event) = handler.next().await {} });

		let page = match browser.new_page("about:blank").await {
			Ok(page) => page,
			Err(e) => {
				let mut session = Self {
					browser: Some(browser),
					page: None,
					handler: Some(handle),
				};
				session.close().await;
				return Err(eyre!("Failed to create new page: {}", e));
			}
		};
		tracing::debug!(visible, "browser ready");

		Ok(Self {
			browser: Some(browser),
			page: Some(page),
			handler: Some(handle),
		})
	}

	fn page(&self) -> Result<&Page> {
		self.page.as_ref().ok_or_else(|| eyre!("Browser session is already closed"))
	}

	async fn evaluate_bool(&self, script: String, what: &str) -> Result<bool> {
		let result = self.page()?.evaluate(script).await.map_err(|e| eyre!("Failed to {}: {}", what, e))?;
		Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
	}
}

impl BrowserSession for ChromeSession {
	async fn navigate(&mut self, address: &str) -> Result<String> {
		let address = ensure_scheme(address);
		let page = self.page()?;
		page.goto(address.as_str()).await.map_err(|e| eyre!("Failed to navigate to {}: {}", address, e))?;
		let landed = page.url().await.ok().flatten().unwrap_or_else(|| address.clone());
		tracing::debug!(%landed, "navigated");
		Ok(landed)
	}

	async fn rendered_state(&self) -> Result<RenderedDocument> {
		let page = self.page()?;
		let address = page.url().await.ok().flatten().unwrap_or_default();
		let html = page
			.evaluate("document.documentElement.outerHTML")
			.await
			.map_err(|e| eyre!("Failed to get page HTML: {}", e))?;
		let html = html.value().and_then(|v| v.as_str()).ok_or_else(|| eyre!("Page returned no document"))?;
		Ok(RenderedDocument::new(address, html))
	}

	async fn write_field(&self, field: &FieldRef, value: &FieldValue) -> Result<()> {
		let selector = serde_json::to_string(ANSWER_FIELD_SELECTOR)?;
		let body = match (value, &field.kind) {
			(FieldValue::Text(text), FieldKind::TextInput | FieldKind::TextArea) => {
				let text = serde_json::to_string(text)?;
				format!(
					r#"
					if (el.tagName === 'SELECT') return false;
					el.focus();
					el.value = '';
					el.value = {text};"#
				)
			}
			(FieldValue::Option(value), FieldKind::Select { multiple }) => {
				let value = serde_json::to_string(value)?;
				format!(
					r#"
					if (el.tagName !== 'SELECT') return false;
					if ({multiple}) {{
						for (const opt of el.options) opt.selected = opt.value === {value};
					}} else {{
						el.value = {value};
					}}"#
				)
			}
			_ => return Err(eyre!("Value {:?} does not fit a {:?} field", value, field.kind)),
		};
		let script = format!(
			r#"
			(function() {{
				const el = document.querySelectorAll({selector})[{index}];
				if (!el) return false;
				{body}
				el.dispatchEvent(new Event('input', {{ bubbles: true }}));
				el.dispatchEvent(new Event('change', {{ bubbles: true }}));
				return true;
			}})()
			"#,
			index = field.index
		);

		if !self.evaluate_bool(script, "write answer").await? {
			return Err(eyre!("Answer field #{} is gone or changed type", field.index));
		}
		Ok(())
	}

	async fn click(&self, target: &ClickTarget) -> Result<bool> {
		let script = match target {
			ClickTarget::Css(css) => {
				let css = serde_json::to_string(css)?;
				format!(
					r#"
					(function() {{
						const btn = document.querySelector({css});
						if (btn) {{ btn.click(); return true; }}
						return false;
					}})()
					"#
				)
			}
			ClickTarget::ButtonText(needle) => {
				let needle = serde_json::to_string(needle)?;
				format!(
					r#"
					(function() {{
						for (const btn of document.querySelectorAll('button')) {{
							if ((btn.textContent || '').includes({needle})) {{ btn.click(); return true; }}
						}}
						return false;
					}})()
					"#
				)
			}
		};
		self.evaluate_bool(script, "click").await
	}

	async fn close(&mut self) {
		self.page.take();
		if let Some(mut browser) = self.browser.take() {
			if let Err(e) = browser.close().await {
				tracing::debug!("{}", QuizError::Teardown(e.to_string()));
			}
			if let Err(e) = browser.wait().await {
				tracing::debug!("{}", QuizError::Teardown(e.to_string()));
			}
		}
		if let Some(handle) = self.handler.take() {
			handle.abort();
		}
	}
}

impl Drop for ChromeSession {
	fn drop(&mut self) {
		// Browser's own Drop kills the child; only the event pump is left
		if let Some(handle) = self.handler.take() {
			handle.abort();
		}
	}
}
