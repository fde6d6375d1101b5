use axum::response::Html;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Welcome page HTML", content_type = "text/html")
    ),
    tag = "General"
)]
pub async fn root() -> Html<&'static str> {
    Html(r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <meta name="viewport" content="width=device-width, initial-scale=1.0">
            <title>ArticulateHub</title>
            <style>
                body {
                    display: flex;
                    flex-direction: column;
                    justify-content: center;
                    align-items: center;
                    height: 100vh;
                    margin: 0;
                    font-family: Arial, sans-serif;
                    background-color: #14121a;
                    color: #e8e2d0;
                }
                p {
                    color: #a89f8a;
                }
                a {
                    margin-top: 20px;
                    padding: 10px 20px;
                    background-color: #7a5cff;
                    color: white;
                    text-decoration: none;
                    border-radius: 5px;
                    font-weight: bold;
                }
            </style>
        </head>
        <body>
            <h1>ArticulateHub</h1>
            <p>Image to 3D reconstruction and automatic rigging.</p>
            <a href="/swagger-ui/">Explore API Docs</a>
        </body>
        </html>
    "#)
}
