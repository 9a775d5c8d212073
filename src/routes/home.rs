use axum::response::Html;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Landing page", content_type = "text/html")
    ),
    tag = "General"
)]
pub async fn root() -> Html<&'static str> {
    Html(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Media Ingest</title>
    <style>
        body { font-family: Arial, sans-serif; max-width: 40rem; margin: 4rem auto; color: #2d3a2e; }
        code { background: #eef1ed; padding: 0 .3rem; }
    </style>
</head>
<body>
    <h1>Media Ingest</h1>
    <p>Image uploads with generated thumbnails.</p>
    <ul>
        <li><code>POST /media</code> multipart upload, field <code>file</code></li>
        <li><code>GET /media</code></li>
        <li><code>GET /media/{id}</code></li>
        <li><code>DELETE /media/{id}</code></li>
    </ul>
    <p><a href="/swagger-ui/">API reference</a></p>
</body>
</html>
"#)
}
