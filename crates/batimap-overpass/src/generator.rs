//! Client for the cadastre vector data generator

use async_trait::async_trait;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::City;
use batimap_core::ports::{CadastreGenerator, LineStream};
use futures::{Stream, StreamExt};

/// Triggers generation on the cadastre website and streams its log
#[derive(Debug, Clone)]
pub struct HttpCadastreGenerator {
    url: String,
    client: reqwest::Client,
}

impl HttpCadastreGenerator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn upstream_error(&self, reason: String) -> BatimapError {
        BatimapError::Upstream {
            source_name: self.url.clone(),
            reason,
        }
    }
}

#[async_trait]
impl CadastreGenerator for HttpCadastreGenerator {
    async fn generate<'a>(&'a self, city: &'a City, force: bool) -> Result<LineStream<'a>> {
        let name_cadastre = city
            .name_cadastre
            .as_deref()
            .ok_or_else(|| BatimapError::MissingCadastreName {
                insee: city.insee.clone(),
            })?;
        let department = format!("{:0>3}", city.department);
        let force = force.to_string();
        let form = [
            ("dep", department.as_str()),
            ("type", "bati"),
            ("force", force.as_str()),
            ("ville", name_cadastre),
        ];

        tracing::info!(city = %city, force = %force, "Requesting cadastre generation");
        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.upstream_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.upstream_error(format!("HTTP {}", response.status())));
        }

        let source_name = self.url.clone();
        let chunks = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| BatimapError::Upstream {
                source_name: source_name.clone(),
                reason: e.to_string(),
            })
        });
        Ok(split_lines(chunks).boxed())
    }
}

/// Re-split a byte stream into text lines, the trailing partial line included
pub fn split_lines<S, B>(chunks: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = (Box::pin(chunks), Vec::<u8>::new(), false);
    futures::stream::unfold(state, |(mut chunks, mut buf, mut done)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                return Some((Ok(decode(&line)), (chunks, buf, done)));
            }
            if done {
                if buf.is_empty() {
                    return None;
                }
                let line = decode(&buf);
                buf.clear();
                return Some((Ok(line), (chunks, buf, done)));
            }
            match chunks.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(e), (chunks, buf, true))),
                None => done = true,
            }
        }
    })
}

fn decode(line: &[u8]) -> String {
    String::from_utf8_lossy(line).trim_end_matches(['\r', '\n']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_split_lines_across_chunks() {
        let chunks = stream::iter(vec![
            Ok::<_, BatimapError>(b"first li".to_vec()),
            Ok(b"ne\r\nsecond\nthi".to_vec()),
            Ok(b"rd".to_vec()),
        ]);
        let lines: Vec<String> = split_lines(chunks).map(|l| l.unwrap()).collect().await;
        assert_eq!(lines, vec!["first line", "second", "third"]);
    }

    #[tokio::test]
    async fn test_split_lines_surfaces_errors() {
        let chunks = stream::iter(vec![
            Ok(b"ok\n".to_vec()),
            Err(BatimapError::Upstream {
                source_name: "cadastre".into(),
                reason: "reset".into(),
            }),
        ]);
        let lines: Vec<Result<String>> = split_lines(chunks).collect().await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_ref().unwrap(), "ok");
        assert!(lines[1].is_err());
    }

    #[tokio::test]
    async fn test_generation_requires_cadastre_name() {
        let generator = HttpCadastreGenerator::new("http://127.0.0.1:9");
        let city = City::new("26400", "Cobonne");
        let result = generator.generate(&city, false).await;
        assert!(matches!(result, Err(BatimapError::MissingCadastreName { .. })));
    }
}
