use crate::models::DeviceType;

/// Classify a User-Agent string; unknown or missing agents count as desktop
pub fn detect_device_type(user_agent: Option<&str>) -> DeviceType {
    let Some(ua) = user_agent else {
        return DeviceType::Desktop;
    };
    let ua = ua.to_lowercase();

    let is_tablet = ua.contains("ipad")
        || ua.contains("tablet")
        || ua.contains("kindle")
        || ua.contains("silk/")
        || (ua.contains("android") && !ua.contains("mobile"));
    if is_tablet {
        return DeviceType::Tablet;
    }

    let is_mobile = ["mobi", "iphone", "ipod", "android", "blackberry", "opera mini", "windows phone"]
        .iter()
        .any(|needle| ua.contains(needle));
    if is_mobile {
        return DeviceType::Mobile;
    }

    DeviceType::Desktop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_agents() {
        let chrome = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        assert_eq!(detect_device_type(Some(chrome)), DeviceType::Desktop);
        assert_eq!(detect_device_type(None), DeviceType::Desktop);
        assert_eq!(detect_device_type(Some("")), DeviceType::Desktop);
    }

    #[test]
    fn test_mobile_agents() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";
        assert_eq!(detect_device_type(Some(iphone)), DeviceType::Mobile);
        assert_eq!(detect_device_type(Some(android)), DeviceType::Mobile);
    }

    #[test]
    fn test_tablet_agents() {
        let ipad = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
        let android_tablet = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";
        assert_eq!(detect_device_type(Some(ipad)), DeviceType::Tablet);
        assert_eq!(detect_device_type(Some(android_tablet)), DeviceType::Tablet);
    }
}
