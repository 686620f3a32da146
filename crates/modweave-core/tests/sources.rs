mod support;

use std::sync::Arc;

use modweave_core::error::{ModError, NotFoundKind};
use modweave_core::source::{ModSource, SearchQuery, SourceRegistry};

use support::FakeSource;

#[tokio::test]
async fn registry_dispatches_by_source_id() {
    let sources = SourceRegistry::new()
        .with(Arc::new(FakeSource::new("nexus").with_mod("ui", "5.2")))
        .with(Arc::new(FakeSource::new("thunderstore").with_mod("bepinex", "5.4")));

    assert_eq!(sources.ids().collect::<Vec<_>>(), vec!["nexus", "thunderstore"]);

    let source = sources.get("thunderstore").expect("source should be registered");
    let m = source
        .get_mod(support::GAME_ID, "bepinex")
        .await
        .expect("mod should exist");
    assert_eq!(m.version, "5.4");

    assert!(matches!(
        sources.get("moddb"),
        Err(ModError::NotFound {
            kind: NotFoundKind::Source,
            ..
        })
    ));
}

#[tokio::test]
async fn search_takes_a_typed_query() {
    let source = FakeSource::new("nexus")
        .with_mod("ui", "5.2")
        .with_mod("weather", "3.0");
    let query = SearchQuery::new(support::GAME_ID, "UI").page_size(500);

    let found = source.search(&query).await.expect("search should succeed");

    assert_eq!(query.page_size, SearchQuery::MAX_PAGE_SIZE);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "ui");
}

#[tokio::test]
async fn auth_surface_defaults_to_not_supported() {
    let source = FakeSource::new("nexus");

    assert!(!source.is_authenticated());
    assert!(matches!(
        source.set_api_key("secret"),
        Err(ModError::NotSupported { .. })
    ));
    let err = source.exchange_token("code").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Source 'nexus' does not support OAuth token exchange"
    );
    assert!(matches!(
        source.validate_api_key("secret").await,
        Err(ModError::NotSupported { .. })
    ));
}
