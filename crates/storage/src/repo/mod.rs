mod comments;
mod replies;
