//! Static content: the landing page and the OpenSearch descriptor.

pub const HOME_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>BangServer</title>
    <link rel="search" type="application/opensearchdescription+xml" title="BangSearch" href="/opensearch.xml" />
    <style>
        body { font-family: system-ui, -apple-system, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }
        h1 { color: #333; }
        code { background: #f5f5f5; padding: 2px 4px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>BangServer</h1>
    <p>Fast redirects for DuckDuckGo-style bang commands.</p>
    <p>Add it to your browser from the address bar options (or by right-clicking the search field) and choose "Add BangSearch".</p>
    <p>Type <code>!</code> followed by a keyword to search a specific site, e.g. <code>!w cats</code> for Wikipedia.</p>
</body>
</html>"#;

#[derive(Debug, Clone)]
pub struct Pages {
    opensearch: String,
}

impl Pages {
    /// `public_url` is the externally visible base URL, e.g. `http://localhost:3000`.
    pub fn new(public_url: &str) -> Self {
        let base = public_url.trim_end_matches('/');
        let opensearch = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<OpenSearchDescription xmlns="http://a9.com/-/spec/opensearch/1.1/">
  <ShortName>BangSearch</ShortName>
  <Description>Fast bang search</Description>
  <InputEncoding>UTF-8</InputEncoding>
  <Url type="text/html" method="GET" template="{base}/?q={{searchTerms}}"/>
  <Url type="application/x-suggestions+json" method="GET" template="https://search.brave.com/api/suggest?q={{searchTerms}}"/>
</OpenSearchDescription>"#
        );
        Self { opensearch }
    }

    pub fn home(&self) -> &[u8] {
        HOME_HTML.as_bytes()
    }

    pub fn opensearch(&self) -> &[u8] {
        self.opensearch.as_bytes()
    }
}
