//! # Key Lifecycle Flows
//!
//! RSA key and challenge secret bootstrap across several gateway instances
//! sharing one settings table.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use axum::http::StatusCode;
    use lf_gateway::domain::settings::keys;
    use lf_gateway::ports::ManualTimeSource;
    use lf_gateway::{
        encrypt_with_public_key, GatewayService, InMemoryQuotaStore, InMemorySettingStore,
        KeySource, SettingStore,
    };
    use std::sync::Arc;

    async fn instance(settings: Arc<InMemorySettingStore>) -> GatewayService {
        GatewayService::new(
            test_config(),
            settings,
            Arc::new(InMemoryQuotaStore::new()),
            Arc::new(ManualTimeSource::new(START_MS)),
        )
        .await
        .expect("valid test config")
    }

    async fn advertised_key(harness: &Harness) -> String {
        let response = harness.send(get_from("/status", "192.0.2.1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["publicKey"]
            .as_str()
            .expect("publicKey")
            .to_string()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_instances_converge_on_one_key() {
        let settings = Arc::new(InMemorySettingStore::new());
        let a = Arc::new(instance(settings.clone()).await);
        let b = Arc::new(instance(settings.clone()).await);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let service = if i % 2 == 0 { Arc::clone(&a) } else { Arc::clone(&b) };
                tokio::spawn(async move {
                    service.bootstrap().await;
                    service.keys().public_key_pem().await.expect("public key")
                })
            })
            .collect();
        let pems: Vec<String> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.expect("task"))
            .collect();

        assert!(pems.windows(2).all(|w| w[0] == w[1]));
        assert!(settings
            .get_setting(keys::RSA_PRIVATE_KEY)
            .await
            .unwrap()
            .is_some());

        // Ciphertext for one instance decrypts on the other
        let ciphertext = encrypt_with_public_key(&pems[0], "correct horse").unwrap();
        assert_eq!(b.keys().decrypt(&ciphertext).await.unwrap(), "correct horse");
    }

    #[tokio::test]
    async fn test_status_key_decrypts_login_payloads() {
        let harness = Harness::new(test_config()).await;
        harness.service.bootstrap().await;

        let pem = advertised_key(&harness).await;
        let ciphertext = encrypt_with_public_key(&pem, "pässwörd ✓").unwrap();
        assert_eq!(
            harness.service.keys().decrypt(&ciphertext).await.unwrap(),
            "pässwörd ✓"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_until_setting_present() {
        let harness = Harness::new(test_config()).await;
        let response = harness.send(get_from("/status", "192.0.2.1")).await;
        assert_eq!(json_body(response).await["configured"], false);

        let settings = InMemorySettingStore::new().with_setting(keys::SYSTEM_CONFIGURED, "yes");
        let harness = Harness::with_settings(test_config(), settings).await;
        let response = harness.send(get_from("/status", "192.0.2.1")).await;
        assert_eq!(json_body(response).await["configured"], true);
    }

    #[tokio::test]
    async fn test_settings_outage_serves_ephemeral_key_then_recovers() {
        let harness = Harness::new(test_config()).await;
        harness.settings.set_available(false);
        harness.service.bootstrap().await;

        let ephemeral = advertised_key(&harness).await;
        assert_eq!(harness.service.keys().key_source(), Some(KeySource::Ephemeral));

        harness.settings.set_available(true);
        harness.service.bootstrap().await;
        let persisted = advertised_key(&harness).await;

        assert_eq!(harness.service.keys().key_source(), Some(KeySource::Generated));
        assert_ne!(ephemeral, persisted);
        assert_eq!(harness.settings.write_count(), 1);
    }

    #[tokio::test]
    async fn test_status_alone_recovers_shared_key_after_boot_outage() {
        let settings = Arc::new(InMemorySettingStore::new());
        settings.set_available(false);
        let stranded = Harness::with_shared_settings(test_config(), settings.clone()).await;
        stranded.service.bootstrap().await;
        let ephemeral = advertised_key(&stranded).await;
        assert_eq!(stranded.service.keys().key_source(), Some(KeySource::Ephemeral));

        settings.set_available(true);
        let healthy = instance(settings.clone()).await;
        healthy.bootstrap().await;
        let shared = healthy.keys().public_key_pem().await.unwrap();

        // No second bootstrap: the next /status picks up the shared key
        let recovered = advertised_key(&stranded).await;
        assert_ne!(recovered, ephemeral);
        assert_eq!(recovered, shared);
        assert!(stranded.service.keys().is_initialized());

        let ciphertext = encrypt_with_public_key(&recovered, "across instances").unwrap();
        assert_eq!(
            healthy.keys().decrypt(&ciphertext).await.unwrap(),
            "across instances"
        );
    }

    #[tokio::test]
    async fn test_wiped_table_yields_new_key_on_next_process() {
        let settings = Arc::new(InMemorySettingStore::new());
        let first = instance(settings.clone()).await;
        first.bootstrap().await;
        let old_pem = first.keys().public_key_pem().await.unwrap();
        let old_ciphertext = encrypt_with_public_key(&old_pem, "secret").unwrap();

        settings.clear();
        let second = instance(settings.clone()).await;
        second.bootstrap().await;

        assert_ne!(second.keys().public_key_pem().await.unwrap(), old_pem);
        assert!(second.keys().decrypt(&old_ciphertext).await.is_err());
    }

    #[tokio::test]
    async fn test_challenge_secret_shared_across_instances() {
        let settings = Arc::new(InMemorySettingStore::new());
        let a = instance(settings.clone()).await;
        let b = instance(settings.clone()).await;

        let issued = a.challenges().issue_challenge().await;
        let payload = lf_gateway::domain::challenge::solve(&issued)
            .expect("solvable")
            .encode();
        assert!(b.challenges().verify(&payload).await);
    }
}
