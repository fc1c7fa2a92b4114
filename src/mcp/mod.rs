// Cadence — MCP Server Module
//
// Exposes the knowledge assistant as MCP tools that AI clients can discover
// and call via stdio transport.

mod server;

pub use server::CadenceServer;
