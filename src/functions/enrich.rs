use std::net::IpAddr;

use super::{Args, CallContext, FuncError, Function, Param};
use crate::value::Value;

const KEY_PARAMS: &[Param] = &[Param::required("key")];

/// `geoip(key)`: resolve the IP address in `key` and spread `city`,
/// `region`, `country` and `isp` into the record.
pub struct GeoIp;

impl Function for GeoIp {
    fn name(&self) -> &'static str {
        "geoip"
    }

    fn params(&self) -> &'static [Param] {
        KEY_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Look up the IP address in `key` and set city, region, country and isp."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let text = ctx.text(&key)?;

        let ip: IpAddr = text
            .trim()
            .parse()
            .map_err(|_| FuncError::runtime("geoip", format!("`{}` is not an IP address", text)))?;
        let resolver = ctx
            .services
            .geo
            .as_ref()
            .ok_or_else(|| FuncError::runtime("geoip", "no geo table configured"))?;
        let record = resolver
            .lookup(ip)
            .ok_or_else(|| FuncError::runtime("geoip", format!("no location for {}", ip)))?;

        ctx.record.set("city", Value::String(record.city));
        ctx.record.set("region", Value::String(record.region));
        ctx.record.set("country", Value::String(record.country));
        ctx.record.set("isp", Value::String(record.isp));
        Ok(())
    }
}

/// `user_agent(key)`
pub struct UserAgent;

impl Function for UserAgent {
    fn name(&self) -> &'static str {
        "user_agent"
    }

    fn params(&self) -> &'static [Param] {
        KEY_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Parse the User-Agent in `key` and set isMobile, isBot, os, browser, browserVer, engine, engineVer and ua."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let text = ctx.text(&key)?;
        let info = ctx.services.user_agent.parse(&text);

        let record = &mut *ctx.record;
        record.set("isMobile", Value::Boolean(info.mobile));
        record.set("isBot", Value::Boolean(info.bot));
        record.set("os", Value::String(info.os));
        record.set("browser", Value::String(info.browser));
        record.set("browserVer", Value::String(info.browser_version));
        record.set("engine", Value::String(info.engine));
        record.set("engineVer", Value::String(info.engine_version));
        record.set("ua", Value::String(info.platform));
        Ok(())
    }
}
