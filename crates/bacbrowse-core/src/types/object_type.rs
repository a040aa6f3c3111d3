numbered_enum! {
    /// BACnet object types. Numbers the table does not name (including the
    /// vendor range 128..=1023) are kept as [`ObjectType::Other`].
    pub enum ObjectType(u16) {
        AnalogInput = 0,
        AnalogOutput = 1,
        AnalogValue = 2,
        BinaryInput = 3,
        BinaryOutput = 4,
        BinaryValue = 5,
        Calendar = 6,
        Command = 7,
        Device = 8,
        EventEnrollment = 9,
        File = 10,
        Group = 11,
        Loop = 12,
        MultiStateInput = 13,
        MultiStateOutput = 14,
        NotificationClass = 15,
        Program = 16,
        Schedule = 17,
        Averaging = 18,
        MultiStateValue = 19,
        TrendLog = 20,
        LifeSafetyPoint = 21,
        LifeSafetyZone = 22,
        Accumulator = 23,
        PulseConverter = 24,
        EventLog = 25,
        GlobalGroup = 26,
        TrendLogMultiple = 27,
        LoadControl = 28,
        StructuredView = 29,
        AccessDoor = 30,
        CharacterStringValue = 40,
        IntegerValue = 45,
        PositiveIntegerValue = 48,
        NetworkPort = 56,
    }
    other = Other;
}

impl ObjectType {
    pub const fn is_proprietary(self) -> bool {
        self.number() >= 128
    }
}
