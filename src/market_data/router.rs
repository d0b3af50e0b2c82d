//! Routes each instrument to the provider serving its asset class

use async_trait::async_trait;

use super::{AlphaVantageClient, CandleSource, FetchError, TwelveDataClient};
use crate::config::{ProvidersConfig, RoutingConfig};
use crate::types::{AssetClass, Candle, Instrument, Interval};

pub struct RoutedSource {
    forex: Box<dyn CandleSource>,
    crypto: Box<dyn CandleSource>,
    crypto_bases: Vec<String>,
}

impl RoutedSource {
    pub fn new(
        forex: Box<dyn CandleSource>,
        crypto: Box<dyn CandleSource>,
        crypto_bases: Vec<String>,
    ) -> Self {
        Self {
            forex,
            crypto,
            crypto_bases,
        }
    }

    /// Alpha Vantage for forex, Twelve Data for crypto
    pub fn from_config(providers: &ProvidersConfig, routing: &RoutingConfig) -> Self {
        Self::new(
            Box::new(AlphaVantageClient::new(
                &providers.alpha_vantage,
                providers.request_timeout_ms,
            )),
            Box::new(TwelveDataClient::new(
                &providers.twelve_data,
                providers.request_timeout_ms,
            )),
            routing.crypto_bases.clone(),
        )
    }

    fn route(&self, instrument: &Instrument) -> &dyn CandleSource {
        match self.asset_class(instrument) {
            AssetClass::Forex => self.forex.as_ref(),
            AssetClass::Crypto => self.crypto.as_ref(),
        }
    }
}

#[async_trait]
impl CandleSource for RoutedSource {
    fn name(&self) -> &'static str {
        "routed"
    }

    async fn fetch(
        &self,
        instrument: &Instrument,
        interval: Interval,
    ) -> Result<Vec<Candle>, FetchError> {
        self.route(instrument).fetch(instrument, interval).await
    }

    fn asset_class(&self, instrument: &Instrument) -> AssetClass {
        instrument.asset_class(self.crypto_bases.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl CandleSource for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn fetch(&self, _: &Instrument, _: Interval) -> Result<Vec<Candle>, FetchError> {
            Err(FetchError::Provider(self.0.to_string()))
        }
    }

    fn routed() -> RoutedSource {
        RoutedSource::new(
            Box::new(Named("forex")),
            Box::new(Named("crypto")),
            vec!["BTC".into(), "ETH".into()],
        )
    }

    #[tokio::test]
    async fn test_routes_by_base() {
        let source = routed();
        let btc = Instrument::parse("BTCUSD").unwrap();
        let gbp = Instrument::parse("GBPJPY").unwrap();

        assert_eq!(source.asset_class(&btc), AssetClass::Crypto);
        assert_eq!(
            source.fetch(&btc, Interval::Hour1).await.unwrap_err(),
            FetchError::Provider("crypto".into())
        );
        assert_eq!(
            source.fetch(&gbp, Interval::Hour1).await.unwrap_err(),
            FetchError::Provider("forex".into())
        );
    }

    #[test]
    fn test_configured_list_overrides_default() {
        let source = routed();
        // SOL is crypto by default but not in this routing list
        let sol = Instrument::parse("SOLUSD").unwrap();
        assert_eq!(source.asset_class(&sol), AssetClass::Forex);
    }
}
