use axum::http::{StatusCode, header};
use proptest::prelude::*;
use serde_json::{Value, json};

mod common;

// Generate titles that survive trimming with at least one character
prop_compose! {
    fn arb_title()(core in "[a-zA-Z0-9 ]{0,24}") -> String {
        format!("Story {}", core.trim())
    }
}

// Valid semicolon rows with unique per-index URLs
fn valid_rows(titles: &[String]) -> Vec<String> {
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| format!("{title};https://example.com/item{i};Tech"))
        .collect()
}

// Rows whose URL field cannot parse, so validation rejects them
fn invalid_rows(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("Broken {i};plain-text-{i};Tech"))
        .collect()
}

#[cfg(test)]
mod properties {
    use super::*;
    use crate::common::server_utils::{admin_url, bearer, create_test_server, login};

    proptest! {
        #[test]
        fn import_report_accounting_property(
            titles in prop::collection::vec(arb_title(), 1..6),
            bad_count in 0..4usize,
        ) {
            // Using tokio runtime for async
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let (server, _db) = create_test_server();
                let token = login(&server).await;

                let mut rows = valid_rows(&titles);
                rows.extend(invalid_rows(bad_count));
                let content = rows.join("\n");

                let response = server
                    .post(&admin_url("/api/stories/import/text"))
                    .add_header(header::AUTHORIZATION, bearer(&token))
                    .json(&json!({ "csv_content": content }))
                    .await;
                prop_assert_eq!(response.status_code(), StatusCode::OK);

                let report: Value = response.json();
                let total = report["total"].as_u64().unwrap();
                let successful = report["successful"].as_u64().unwrap();
                let duplicates = report["duplicates"].as_u64().unwrap();
                let failed = report["failed"].as_u64().unwrap();

                prop_assert_eq!(total, rows.len() as u64);
                prop_assert_eq!(successful, titles.len() as u64);
                prop_assert_eq!(failed, bad_count as u64);
                prop_assert_eq!(duplicates, 0);
                prop_assert_eq!(successful + duplicates + failed, total);
                prop_assert_eq!(report["rows"].as_array().unwrap().len() as u64, total);
                Ok(())
            }).expect("Async proptest should not fail")
        }

        #[test]
        fn import_idempotency_property(
            titles in prop::collection::vec(arb_title(), 1..6),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let (server, _db) = create_test_server();
                let token = login(&server).await;

                let content = valid_rows(&titles).join("\n");
                let payload = json!({ "csv_content": content });

                let first = server
                    .post(&admin_url("/api/stories/import/text"))
                    .add_header(header::AUTHORIZATION, bearer(&token))
                    .json(&payload)
                    .await;
                prop_assert_eq!(first.status_code(), StatusCode::OK);

                let first_report: Value = first.json();
                prop_assert_eq!(
                    first_report["successful"].as_u64().unwrap(),
                    titles.len() as u64
                );

                let second = server
                    .post(&admin_url("/api/stories/import/text"))
                    .add_header(header::AUTHORIZATION, bearer(&token))
                    .json(&payload)
                    .await;
                prop_assert_eq!(second.status_code(), StatusCode::OK);

                let second_report: Value = second.json();
                prop_assert_eq!(second_report["successful"].as_u64().unwrap(), 0);
                prop_assert_eq!(
                    second_report["duplicates"].as_u64(),
                    first_report["successful"].as_u64()
                );
                Ok(())
            }).expect("Async proptest should not fail")
        }

        #[test]
        fn create_story_trimming_property(
            title in "[a-zA-Z0-9]{1,20}",
            category in "[a-zA-Z]{1,12}",
            author in prop::option::of("[a-zA-Z]{1,15}"),
            left in " {0,3}",
            right in " {0,3}",
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let (server, _db) = create_test_server();
                let token = login(&server).await;

                let pad = |s: &str| format!("{left}{s}{right}");
                let response = server
                    .post(&admin_url("/api/stories"))
                    .add_header(header::AUTHORIZATION, bearer(&token))
                    .json(&json!({
                        "title": pad(&title),
                        "url": pad("https://example.com/padded"),
                        "category": pad(&category),
                        "author": author.as_deref().map(|a| pad(a)),
                    }))
                    .await;
                prop_assert_eq!(response.status_code(), StatusCode::CREATED);

                let body: Value = response.json();
                prop_assert_eq!(body["title"].as_str().unwrap(), title.as_str());
                prop_assert_eq!(body["url"].as_str().unwrap(), "https://example.com/padded");
                prop_assert_eq!(body["category"].as_str().unwrap(), category.as_str());

                let expected_author = author.as_deref().unwrap_or("Unknown Author");
                prop_assert_eq!(body["author"].as_str().unwrap(), expected_author);
                Ok(())
            }).expect("Async proptest should not fail")
        }
    }
}
