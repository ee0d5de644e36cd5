use crate::handler::write_full;
use crate::http::response::ResponseWriter;
use crate::http::status::StatusCode;

const HTML: &str = "text/html";

pub async fn success(writer: &mut ResponseWriter<'_>) {
    let body = b"<html>\n  <head>\n    <title>200 OK</title>\n  </head>\n  <body>\n    <h1>Success!</h1>\n    <p>Your request was an absolute banger.</p>\n  </body>\n</html>\n";
    write_full(writer, StatusCode::OK, HTML, body).await;
}

pub async fn bad_request(writer: &mut ResponseWriter<'_>) {
    let body = b"<html>\n  <head>\n    <title>400 Bad Request</title>\n  </head>\n  <body>\n    <h1>Bad Request</h1>\n    <p>Your request honestly kinda sucked.</p>\n  </body>\n</html>\n";
    write_full(writer, StatusCode::BAD_REQUEST, HTML, body).await;
}

pub async fn internal_server_error(writer: &mut ResponseWriter<'_>) {
    let body = b"<html>\n  <head>\n    <title>500 Internal Server Error</title>\n  </head>\n  <body>\n    <h1>Internal Server Error</h1>\n    <p>Okay, you know what? This one is on me.</p>\n  </body>\n</html>\n";
    write_full(writer, StatusCode::INTERNAL_SERVER_ERROR, HTML, body).await;
}
